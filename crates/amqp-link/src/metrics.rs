//! Counters for link activity.
//!
//! Lock-free and cheap to update from inside the connection lock. The
//! runtime exports a [`LinkMetricsSnapshot`] to Prometheus on scrape.

use std::sync::atomic::{AtomicU64, Ordering};

/// Link activity counters.
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// Publish calls that completed successfully
    pub events_published: AtomicU64,
    /// Publish calls that returned an error
    pub publish_failures: AtomicU64,
    /// Dial attempts (initial, on-demand and background)
    pub dials: AtomicU64,
    /// Dial attempts made by background retry sequences
    pub reconnect_attempts: AtomicU64,
    /// Retry sequences that restored the link
    pub reconnects_succeeded: AtomicU64,
    /// Retry sequences that gave up
    pub reconnects_exhausted: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self, success: bool) {
        if success {
            self.events_published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dial(&self) {
        self.dials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_succeeded(&self) {
        self.reconnects_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_exhausted(&self) {
        self.reconnects_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> LinkMetricsSnapshot {
        LinkMetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            dials: self.dials.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnects_succeeded: self.reconnects_succeeded.load(Ordering::Relaxed),
            reconnects_exhausted: self.reconnects_exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkMetricsSnapshot {
    pub events_published: u64,
    pub publish_failures: u64,
    pub dials: u64,
    pub reconnect_attempts: u64,
    pub reconnects_succeeded: u64,
    pub reconnects_exhausted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_outcomes() {
        let metrics = LinkMetrics::new();
        metrics.record_publish(true);
        metrics.record_publish(true);
        metrics.record_publish(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_published, 2);
        assert_eq!(snapshot.publish_failures, 1);
    }

    #[test]
    fn test_reconnect_counters() {
        let metrics = LinkMetrics::new();
        metrics.record_dial();
        metrics.record_reconnect_attempt();
        metrics.record_reconnect_succeeded();
        metrics.record_reconnect_exhausted();

        assert_eq!(
            metrics.snapshot(),
            LinkMetricsSnapshot {
                dials: 1,
                reconnect_attempts: 1,
                reconnects_succeeded: 1,
                reconnects_exhausted: 1,
                ..LinkMetricsSnapshot::default()
            }
        );
    }
}
