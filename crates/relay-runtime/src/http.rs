//! # HTTP Ingress
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /v1/events` | Build and publish a certificate event |
//! | `GET /healthz` | Process liveness |
//! | `GET /readyz` | Broker link readiness |
//! | `GET /metrics` | Prometheus exposition |
//!
//! Handlers never reconnect on their own; a publish goes through the link's
//! normal ensure-live path and readiness only reports.

use std::collections::BTreeMap;
use std::sync::Arc;

use amqp_link::ports::BrokerConnector;
use amqp_link::{
    AmqpPublisher, BrokerHealthProbe, ConnectionManager, ConnectionState, EventPublisher,
    HealthProbe,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cert_events::{is_relay_enabled, CertificateEvent, RoutingTarget};
use relay_telemetry::metrics::{self as prom, sync_counter};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Body of `POST /v1/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub secret_name: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    /// Overrides the `rabbitmq-exchange` annotation when non-blank.
    #[serde(default)]
    pub exchange: Option<String>,
    /// Overrides the `rabbitmq-routing-key` annotation when non-blank.
    #[serde(default)]
    pub routing_key: Option<String>,
}

impl EventRequest {
    /// Annotation-derived target with any explicit override applied.
    pub fn routing_target(&self) -> RoutingTarget {
        let mut target = RoutingTarget::resolve(self.annotations.as_ref());
        if let Some(exchange) = non_blank(self.exchange.as_deref()) {
            target.exchange = exchange.to_string();
        }
        if let Some(routing_key) = non_blank(self.routing_key.as_deref()) {
            target.routing_key = routing_key.to_string();
        }
        target
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Shared handler state.
struct AppState<C: BrokerConnector> {
    manager: Arc<ConnectionManager<C>>,
    publisher: AmqpPublisher<C>,
    probe: BrokerHealthProbe<C>,
    /// Cancelled on process shutdown; aborts in-flight sends.
    shutdown: CancellationToken,
}

/// Build the relay router over `manager`.
pub fn router<C: BrokerConnector>(
    manager: Arc<ConnectionManager<C>>,
    shutdown: CancellationToken,
) -> Router {
    let state = Arc::new(AppState {
        publisher: AmqpPublisher::new(Arc::clone(&manager)),
        probe: BrokerHealthProbe::new(Arc::clone(&manager)),
        manager,
        shutdown,
    });

    Router::new()
        .route("/v1/events", post(publish_event::<C>))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<C>))
        .route("/metrics", get(metrics::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn record(route: &str, status: StatusCode) {
    prom::HTTP_REQUESTS
        .with_label_values(&[route, status.as_str()])
        .inc();
}

async fn publish_event<C: BrokerConnector>(
    State(state): State<Arc<AppState<C>>>,
    Json(request): Json<EventRequest>,
) -> Response {
    const ROUTE: &str = "/v1/events";

    if !is_relay_enabled(request.labels.as_ref()) {
        debug!(
            certificate = %request.name,
            namespace = %request.namespace,
            "Relay not enabled for certificate, skipping"
        );
        prom::EVENTS_SKIPPED.inc();
        record(ROUTE, StatusCode::OK);
        return (StatusCode::OK, Json(json!({ "published": false }))).into_response();
    }

    let event = CertificateEvent::build(
        &request.name,
        &request.namespace,
        &request.secret_name,
        request.labels.as_ref(),
        request.annotations.as_ref(),
    );
    if let Err(e) = event.validate() {
        record(ROUTE, StatusCode::BAD_REQUEST);
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
    }

    let target = request.routing_target();
    let cancel = state.shutdown.child_token();
    match state.publisher.publish(&cancel, &target, &event).await {
        Ok(()) => {
            info!(
                certificate = %event.certificate,
                namespace = %event.namespace,
                exchange = %target.exchange,
                routing_key = %target.routing_key,
                "Certificate event published"
            );
            record(ROUTE, StatusCode::ACCEPTED);
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "published": true,
                    "exchange": target.exchange,
                    "routing_key": target.routing_key,
                })),
            )
                .into_response()
        }
        Err(e) => {
            record(ROUTE, StatusCode::SERVICE_UNAVAILABLE);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "published": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn healthz() -> Response {
    record("/healthz", StatusCode::OK);
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

async fn readyz<C: BrokerConnector>(State(state): State<Arc<AppState<C>>>) -> Response {
    match state.probe.health_check().await {
        Ok(()) => {
            record("/readyz", StatusCode::OK);
            (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            record("/readyz", StatusCode::SERVICE_UNAVAILABLE);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn metrics<C: BrokerConnector>(State(state): State<Arc<AppState<C>>>) -> Response {
    let status = state.manager.status().await;
    let snapshot = state.manager.metrics().snapshot();

    prom::BROKER_CONNECTED.set(i64::from(status.state == ConnectionState::Connected));
    prom::BROKER_GENERATION.set(i64::try_from(status.generation).unwrap_or(i64::MAX));
    sync_counter(&prom::EVENTS_PUBLISHED, snapshot.events_published);
    sync_counter(&prom::PUBLISH_FAILURES, snapshot.publish_failures);
    sync_counter(&prom::BROKER_DIALS, snapshot.dials);
    sync_counter(&prom::RECONNECT_ATTEMPTS, snapshot.reconnect_attempts);
    sync_counter(&prom::RECONNECTS_EXHAUSTED, snapshot.reconnects_exhausted);

    match relay_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_target_overrides_annotations() {
        let request = EventRequest {
            annotations: Some(BTreeMap::from([(
                "cert-webhook.golder.tech/rabbitmq-exchange".to_string(),
                "from-annotation".to_string(),
            )])),
            routing_key: Some("explicit.key".to_string()),
            ..EventRequest::default()
        };

        let target = request.routing_target();
        assert_eq!(target.exchange, "from-annotation");
        assert_eq!(target.routing_key, "explicit.key");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let request = EventRequest {
            exchange: Some("  ".to_string()),
            ..EventRequest::default()
        };
        assert_eq!(request.routing_target(), RoutingTarget::default());
    }
}
