//! Prometheus metrics for the relay.
//!
//! All metrics follow the naming convention: `cert_relay_<metric>_<unit>`
//!
//! Broker-link counters live in the link itself as atomics; the runtime
//! copies them here on every scrape with [`sync_counter`].

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PUBLISH METRICS
    // =========================================================================

    /// Events accepted by the broker
    pub static ref EVENTS_PUBLISHED: IntCounter = IntCounter::new(
        "cert_relay_events_published_total",
        "Certificate events accepted by the broker"
    ).expect("metric creation failed");

    /// Publish calls that failed
    pub static ref PUBLISH_FAILURES: IntCounter = IntCounter::new(
        "cert_relay_publish_failures_total",
        "Certificate event publishes that returned an error"
    ).expect("metric creation failed");

    /// Requests skipped because the certificate is not opted in
    pub static ref EVENTS_SKIPPED: IntCounter = IntCounter::new(
        "cert_relay_events_skipped_total",
        "Event requests ignored because the enable label is not set"
    ).expect("metric creation failed");

    // =========================================================================
    // BROKER LINK METRICS
    // =========================================================================

    /// 1 while the broker link is connected
    pub static ref BROKER_CONNECTED: IntGauge = IntGauge::new(
        "cert_relay_broker_connected",
        "Whether the broker link is connected (0/1)"
    ).expect("metric creation failed");

    /// Connection generation, incremented on every successful dial
    pub static ref BROKER_GENERATION: IntGauge = IntGauge::new(
        "cert_relay_broker_connection_generation",
        "Number of connections the broker link has established"
    ).expect("metric creation failed");

    /// Dial attempts
    pub static ref BROKER_DIALS: IntCounter = IntCounter::new(
        "cert_relay_broker_dials_total",
        "Broker dial attempts"
    ).expect("metric creation failed");

    /// Background reconnect attempts
    pub static ref RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "cert_relay_reconnect_attempts_total",
        "Reconnect attempts made after an abnormal close"
    ).expect("metric creation failed");

    /// Retry sequences that gave up
    pub static ref RECONNECTS_EXHAUSTED: IntCounter = IntCounter::new(
        "cert_relay_reconnects_exhausted_total",
        "Reconnect sequences that used every attempt without success"
    ).expect("metric creation failed");

    // =========================================================================
    // HTTP METRICS
    // =========================================================================

    /// HTTP responses by route and status
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("cert_relay_http_requests_total", "HTTP requests by route and status"),
        &["route", "status"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Publish
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(EVENTS_SKIPPED.clone()),
        // Broker link
        Box::new(BROKER_CONNECTED.clone()),
        Box::new(BROKER_GENERATION.clone()),
        Box::new(BROKER_DIALS.clone()),
        Box::new(RECONNECT_ATTEMPTS.clone()),
        Box::new(RECONNECTS_EXHAUSTED.clone()),
        // HTTP
        Box::new(HTTP_REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Raise `counter` to `value`.
///
/// Counters only move forward; a lower `value` leaves the counter as is.
pub fn sync_counter(counter: &IntCounter, value: u64) {
    let current = counter.get();
    if value > current {
        counter.inc_by(value - current);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_sync_counter_only_moves_forward() {
        let counter = IntCounter::new("test_sync_total", "test").unwrap();
        sync_counter(&counter, 5);
        assert_eq!(counter.get(), 5);
        sync_counter(&counter, 3);
        assert_eq!(counter.get(), 5);
        sync_counter(&counter, 9);
        assert_eq!(counter.get(), 9);
    }

    #[test]
    fn test_encode_contains_prefix() {
        register_metrics().unwrap();
        BROKER_CONNECTED.set(1);
        let text = encode_metrics().unwrap();
        assert!(text.contains("cert_relay_broker_connected 1"));
    }
}
