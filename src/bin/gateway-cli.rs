use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use task_gateway::session::claims::{decode_claims, now_epoch_secs};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Session management CLI for the task gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the gateway holds a session
    Status,
    /// Clear the gateway's session
    Logout,
    /// Decode a bearer token's claims locally
    Inspect {
        /// The token to decode
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let session_url = format!("{}/session", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Status => {
            let res = client.get(&session_url).send().await?;
            print_response(res).await?;
        }
        Commands::Logout => {
            let res = client.delete(&session_url).send().await?;
            if res.status().is_success() {
                println!("Session cleared");
            } else {
                print_response(res).await?;
            }
        }
        Commands::Inspect { token } => match decode_claims(&token) {
            Ok(claims) => {
                let now = now_epoch_secs();
                let report = json!({
                    "exp": claims.exp,
                    "sub": claims.sub,
                    "expired": claims.exp <= now,
                    "expires_in_secs": claims.exp - now,
                    "claims": Value::Object(claims.extra),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(e) => {
                eprintln!("Error: token is not usable: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
