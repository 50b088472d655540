//! Task gateway.
//!
//! A same-origin forwarding gateway in front of the task API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ http server ──▶ resolver ──▶ engine ───────┼──▶ Backend
//!                              │        │                         │           │
//!                              │        ▼                         ▼           │
//!                              │   /session               header sanitizer    │
//!                              │                          token store         │
//!     Client Response          │                          failure classifier  │
//!     ◀────────────────────────┼── response relay ◀───────────────┘           │
//!                              │                                              │
//!                              │  Cross-cutting: config, observability,       │
//!                              │  session freshness, lifecycle                │
//!                              └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use task_gateway::config::load_config;
use task_gateway::http::HttpServer;
use task_gateway::lifecycle::{signals, Shutdown};
use task_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "task-gateway")]
#[command(about = "Authenticated forwarding gateway for the task API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!("task-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        prefix = %config.proxy.prefix,
        persistent_session = config.session.store_path.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone())?;

    // Bind last so traffic only arrives once everything is ready.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
