// tests/health_tests.rs
use async_trait::async_trait;
use hyper::{body, Body, Request, StatusCode};
use serde_json::Value;
use service_health::{Health, Probe, ProbeError, StatusHandler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

struct Toggle(AtomicBool);

impl Toggle {
    fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(healthy)))
    }
}

#[async_trait]
impl Probe for Toggle {
    async fn evaluate(&self) -> Result<(), ProbeError> {
        if self.0.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProbeError::msg("toggle is off"))
        }
    }
}

fn no_redirect_health() -> Health {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    Health::new().with_http_client(client)
}

async fn probe_against(server: &mockito::ServerGuard, path: &str) -> Result<(), ProbeError> {
    let health = no_redirect_health();
    let url = Url::parse(&format!("{}{}", server.url(), path)).unwrap();
    health.http_probe(url).evaluate().await
}

async fn wait_until(health: &Health, healthy: bool) {
    for _ in 0..200 {
        let status = health.status().await;
        if status.healthy == healthy && status.checks.iter().all(|c| c.last_checked > 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("health never became {}", healthy);
}

async fn fetch(handler: StatusHandler) -> (StatusCode, Option<String>, Value) {
    let response = handler
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let code = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = body::to_bytes(response.into_body()).await.unwrap();
    (code, content_type, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn http_probe_accepts_200() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("OK")
        .create_async()
        .await;

    assert!(probe_against(&server, "/health").await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn http_probe_accepts_redirects() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/moved")
        .with_status(301)
        .with_header("location", "/elsewhere")
        .create_async()
        .await;

    assert!(probe_against(&server, "/moved").await.is_ok());
}

#[tokio::test]
async fn http_check_drains_large_bodies() {
    let page = "x".repeat(4 * 1024 * 1024);
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("GET", "/big")
        .with_status(200)
        .with_body(page.clone())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/big-error")
        .with_status(500)
        .with_body(page)
        .create_async()
        .await;

    // Twice over the same client, so the drained connection gets reused.
    let health = no_redirect_health();
    let url = Url::parse(&format!("{}/big", server.url())).unwrap();
    let check = health.http_probe(url);
    assert!(check.evaluate().await.is_ok());
    assert!(check.evaluate().await.is_ok());
    ok.assert_async().await;

    let err = probe_against(&server, "/big-error").await.unwrap_err();
    assert!(matches!(err, ProbeError::Status(500)));
}

#[tokio::test]
async fn http_probe_rejects_404() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(404)
        .with_body("not here")
        .create_async()
        .await;

    let err = probe_against(&server, "/health").await.unwrap_err();
    assert!(matches!(err, ProbeError::Status(404)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn http_probe_reports_connection_errors() {
    let health = Health::new();
    let probe = health.http_probe(Url::parse("http://127.0.0.1:1/").unwrap());

    let err = probe.evaluate().await.unwrap_err();
    assert!(matches!(err, ProbeError::Transport(_)));
    assert!(!err.to_string().is_empty());
}

#[tokio::test]
async fn loop_records_http_failures_in_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/up")
        .with_status(200)
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("GET", "/down")
        .with_status(503)
        .expect_at_least(1)
        .create_async()
        .await;

    let health = Arc::new(no_redirect_health());
    let up = health.http_probe(Url::parse(&format!("{}/up", server.url())).unwrap());
    let down = health.http_probe(Url::parse(&format!("{}/down", server.url())).unwrap());
    health.add_check("up", false, up).await;
    health.add_check("down", false, down).await;

    let runner = {
        let health = health.clone();
        tokio::spawn(async move { health.run(Duration::from_millis(100)).await })
    };
    wait_until(&health, false).await;

    let status = health.status().await;
    let down = status.checks.iter().find(|c| c.name == "down").unwrap();
    assert_eq!(down.message, "down ERROR HTTP status code 503 returned");
    let up = status.checks.iter().find(|c| c.name == "up").unwrap();
    assert_eq!(up.message, "OK");

    health.stop().await;
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn handler_reports_healthy_with_200() {
    let health = Arc::new(Health::new());
    health.add_check("api", false, Toggle::new(true)).await;
    health.add_check("search", true, Toggle::new(false)).await;

    let runner = {
        let health = health.clone();
        tokio::spawn(async move { health.run(Duration::from_millis(50)).await })
    };
    wait_until(&health, true).await;

    let (code, content_type, json) = fetch(StatusHandler::new(health.clone())).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(json["healthy"], Value::Bool(true));

    let checks = json["checks"].as_array().unwrap();
    assert_eq!(checks.len(), 2);
    let search = checks.iter().find(|c| c["service"] == "search").unwrap();
    assert_eq!(search["observeOnly"], Value::Bool(true));
    assert!(search.get("healthy").is_none());
    assert!(search["lastChecked"].as_u64().unwrap() > 0);

    health.stop().await;
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn handler_reports_unhealthy_with_teapot() {
    let health = Arc::new(Health::new());
    let api = Toggle::new(false);
    health.add_check("api", false, api.clone()).await;

    let runner = {
        let health = health.clone();
        tokio::spawn(async move { health.run(Duration::from_millis(50)).await })
    };
    wait_until(&health, false).await;

    let (code, _, json) = fetch(StatusHandler::new(health.clone())).await;
    assert_eq!(code, StatusCode::IM_A_TEAPOT);
    assert!(json.get("healthy").is_none());
    assert_eq!(json["checks"][0]["message"], "api ERROR toggle is off");

    api.0.store(true, Ordering::SeqCst);
    wait_until(&health, true).await;
    let (code, _, _) = fetch(StatusHandler::new(health.clone())).await;
    assert_eq!(code, StatusCode::OK);

    health.stop().await;
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn server_serves_status_over_tcp() {
    let health = Arc::new(Health::new());
    let bound = service_health::server::ServerBuilder::new(
        "127.0.0.1:0".parse().unwrap(),
        StatusHandler::new(health.clone()),
    )
    .bind()
    .await
    .unwrap();
    let addr = bound.local_addr().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(bound.serve(async move {
        let _ = rx.await;
    }));

    let client = hyper::Client::new();
    let uri: hyper::Uri = format!("http://{}/health", addr).parse().unwrap();
    let response = client.get(uri).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&bytes[..], br#"{"healthy":true}"#);

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
