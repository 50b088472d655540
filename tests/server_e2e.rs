//! End-to-end tests through the HTTP server.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;

use task_gateway::config::GatewayConfig;
use task_gateway::http::HttpServer;
use task_gateway::lifecycle::Shutdown;
use task_gateway::session::{Session, SessionInvalidator};

mod common;

async fn start_gateway(config: GatewayConfig, invalidator: SessionInvalidator) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::with_session(config, invalidator).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn relays_through_proxy_prefix() {
    let backend = common::start_echo_backend().await;
    let config = common::config_for(backend);
    let (store, invalidator) = common::session_for(&config);
    let token = common::token_expiring_at(common::now() + 3600);
    store.establish(Session::new(token.clone(), None)).unwrap();
    let (gateway, shutdown) = start_gateway(config, invalidator).await;

    let res = client()
        .get(format!("http://{}/api/proxy/api/tasks/?page=2", gateway))
        .header("authorization", "Bearer forged")
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-request-id").is_some());
    assert!(res.headers().get("set-cookie").is_none());
    let echoed: Value = res.json().await.unwrap();
    assert_eq!(echoed["target"], "/api/tasks/?page=2");
    assert_eq!(echoed["headers"]["authorization"], format!("Bearer {}", token));

    shutdown.trigger();
}

#[tokio::test]
async fn unauthorized_maps_to_redirect_body() {
    let backend = common::start_programmable_backend(|_| async {
        Some((401, "{}".to_string()))
    })
    .await;
    let config = common::config_for(backend);
    let (store, invalidator) = common::session_for(&config);
    store
        .establish(Session::new(common::token_expiring_at(common::now() + 3600), Some("Ada".into())))
        .unwrap();
    let (gateway, shutdown) = start_gateway(config, invalidator).await;

    let res = client()
        .get(format!("http://{}/api/proxy/api/tasks/", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["redirect"], "/auth/sign-in");

    let status: Value = client()
        .get(format!("http://{}/session", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["authenticated"], false);
    assert!(status["display_name"].is_null());

    shutdown.trigger();
}

#[tokio::test]
async fn backend_down_maps_to_proxy_failure_body() {
    let config = common::config_for(common::unused_addr());
    let (_, invalidator) = common::session_for(&config);
    let (gateway, shutdown) = start_gateway(config, invalidator).await;

    let res = client()
        .post(format!("http://{}/api/proxy/api/tasks/", gateway))
        .body(r#"{"title":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Proxy request failed");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("Unable to connect to the server"));

    shutdown.trigger();
}

#[tokio::test]
async fn session_endpoint_reports_and_clears() {
    let backend = common::start_echo_backend().await;
    let config = common::config_for(backend);
    let (store, invalidator) = common::session_for(&config);
    store
        .establish(Session::new(common::token_expiring_at(common::now() + 3600), Some("Ada".into())))
        .unwrap();
    let (gateway, shutdown) = start_gateway(config, invalidator).await;
    let url = format!("http://{}/session", gateway);

    let status: Value = client().get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["display_name"], "Ada");

    let res = client().delete(&url).send().await.unwrap();
    assert_eq!(res.status(), 204);
    assert!(store.token().is_none());

    // Idempotent.
    let res = client().delete(&url).send().await.unwrap();
    assert_eq!(res.status(), 204);

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_rejected_before_forwarding() {
    let backend = common::start_echo_backend().await;
    let mut config = common::config_for(backend);
    config.proxy.max_body_size = 16;
    let (_, invalidator) = common::session_for(&config);
    let (gateway, shutdown) = start_gateway(config, invalidator).await;

    let res = client()
        .post(format!("http://{}/api/proxy/api/tasks/", gateway))
        .body(vec![b'a'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert!(res.headers().get("x-request-id").is_some());

    let res = client()
        .post(format!("http://{}/api/proxy/api/tasks/", gateway))
        .body(r#"{"t":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}
