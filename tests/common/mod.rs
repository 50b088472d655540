//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use task_gateway::config::GatewayConfig;
use task_gateway::lifecycle::startup::build_session;
use task_gateway::session::{SessionInvalidator, TokenStore};

/// A request as the mock backend received it.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The request echoed back as JSON.
    pub fn to_json(&self) -> Value {
        let headers: serde_json::Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), Value::String(v.clone())))
            .collect();
        json!({
            "method": self.method,
            "target": self.target,
            "headers": headers,
            "body": String::from_utf8_lossy(&self.body),
        })
    }
}

/// Read one HTTP/1.1 request head and its `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        target,
        headers,
        body,
    })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        204 => "204 No Content",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// Every answer carries a `Set-Cookie` header so tests can check it is
/// never relayed. A handler returning `None` closes the connection without
/// answering.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<(u16, String)>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let Some((status, body)) = f(request).await else {
                            let _ = socket.shutdown().await;
                            return;
                        };
                        let response_str = if status == 204 {
                            format!(
                                "HTTP/1.1 {}\r\nSet-Cookie: sid=backend\r\nConnection: close\r\n\r\n",
                                status_text(status)
                            )
                        } else {
                            format!(
                                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nSet-Cookie: sid=backend\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                status_text(status),
                                body.len(),
                                body
                            )
                        };
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Backend that echoes every request back as JSON with status 200.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|request| async move {
        Some((200, request.to_json().to_string()))
    })
    .await
}

/// Backend whose `/health` answers but whose other endpoints hang up.
pub async fn start_half_broken_backend() -> SocketAddr {
    start_programmable_backend(|request| async move {
        if request.target == "/health" {
            Some((200, r#"{"status":"ok"}"#.to_string()))
        } else {
            None
        }
    })
    .await
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway configuration pointing at `backend`, background tasks off.
pub fn config_for(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.base_url = format!("http://{}", backend);
    config.backend.probe_timeout_ms = 500;
    config.backend.request_timeout_secs = 5;
    config.session.freshness_interval_secs = 0;
    config.session.watch_store = false;
    config
}

/// In-memory session for `config`.
pub fn session_for(config: &GatewayConfig) -> (Arc<TokenStore>, SessionInvalidator) {
    build_session(&config.session)
}

/// Unsigned token whose claims carry `exp`.
pub fn token_expiring_at(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"exp": exp, "sub": "7"}).to_string());
    format!("{}.{}.sig", header, payload)
}

pub fn now() -> i64 {
    task_gateway::session::claims::now_epoch_secs()
}
