//! # HTTP Route Tests
//!
//! Exercise the relay router end to end against the in-memory broker.

use std::sync::Arc;

use amqp_link::{ConnectionManager, InMemoryBroker, LinkConfig};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use relay_runtime::router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn app(broker: &InMemoryBroker) -> (Router, Arc<ConnectionManager<InMemoryBroker>>) {
    let config = LinkConfig::new("amqp://localhost").unwrap();
    let manager = ConnectionManager::connect(config, broker.clone()).await.unwrap();
    (router(Arc::clone(&manager), CancellationToken::new()), manager)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_event(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn enabled_event() -> Value {
    json!({
        "name": "web-tls",
        "namespace": "prod",
        "secret_name": "web-tls-secret",
        "labels": { "cert-webhook.golder.tech/enabled": "true" },
        "annotations": {
            "cert-webhook.golder.tech/target": "docker",
            "cert-webhook.golder.tech/container-names": "nginx, haproxy",
            "cert-webhook.golder.tech/rabbitmq-routing-key": "certs.prod",
            "kubectl.kubernetes.io/last-applied-configuration": "{}"
        }
    })
}

#[tokio::test]
async fn test_publish_enabled_event() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;

    let (status, body) = send(app, post_event(&enabled_event())).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body,
        json!({ "published": true, "exchange": "certificate-events", "routing_key": "certs.prod" })
    );

    let published = broker.published();
    assert_eq!(published.len(), 1);
    let message: Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(message["event"], "certificate.renewed");
    assert_eq!(message["container_names"], json!(["nginx", "haproxy"]));
    assert_eq!(message["trigger"], "cert-manager-webhook");
    assert!(message["metadata"]["annotations"]
        .get("kubectl.kubernetes.io/last-applied-configuration")
        .is_none());
}

#[tokio::test]
async fn test_disabled_certificate_is_skipped() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;

    let mut event = enabled_event();
    event["labels"] = json!({ "cert-webhook.golder.tech/enabled": "false" });
    let (status, body) = send(app, post_event(&event)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "published": false }));
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_missing_identity_is_bad_request() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;

    let mut event = enabled_event();
    event["namespace"] = json!("");
    let (status, body) = send(app, post_event(&event)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("namespace"));
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_explicit_target_wins() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;

    let mut event = enabled_event();
    event["exchange"] = json!("ops-events");
    let (status, body) = send(app, post_event(&event)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["exchange"], "ops-events");
    assert_eq!(body["routing_key"], "certs.prod");
    assert!(broker.exchange("ops-events").is_some());
}

#[tokio::test]
async fn test_publish_failure_is_unavailable() {
    let broker = InMemoryBroker::new();
    let (app, manager) = app(&broker).await;
    manager.shutdown().await.unwrap();

    let (status, body) = send(app, post_event(&enabled_event())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["published"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("failed to ensure connection"));
}

#[tokio::test]
async fn test_healthz_always_ok() {
    let broker = InMemoryBroker::new();
    let (app, manager) = app(&broker).await;
    manager.shutdown().await.unwrap();

    let (status, body) = send(app, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_readyz_follows_link() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;

    let (status, body) = send(app.clone(), get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    broker.reject_probes(true);
    let (status, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
    assert!(body["error"].as_str().unwrap().contains("health check failed"));
}

#[tokio::test]
async fn test_readyz_does_not_reconnect() {
    let broker = InMemoryBroker::new();
    let (app, manager) = app(&broker).await;
    manager.shutdown().await.unwrap();

    let (status, _) = send(app, get("/readyz")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(broker.dial_count(), 1);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let broker = InMemoryBroker::new();
    let (app, _manager) = app(&broker).await;
    relay_telemetry::register_metrics().unwrap();

    let (status, _) = send(app.clone(), post_event(&enabled_event())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("cert_relay_events_published_total"));
    assert!(text.contains("cert_relay_broker_connected"));
    assert!(text.contains("cert_relay_http_requests_total"));
}
