//! Metrics collection and export for the bridge.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use async_trait::async_trait;
use lounge_core::{Delivery, DeliveryError, Notification, Notifier};
use lounge_transport::SessionEnd;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Metric names.
pub mod names {
    pub const SESSIONS_TOTAL: &str = "lounge_sessions_total";
    pub const SESSIONS_ACTIVE: &str = "lounge_sessions_active";
    pub const SESSION_ENDS_TOTAL: &str = "lounge_session_ends_total";
    pub const NOTIFICATIONS_TOTAL: &str = "lounge_notifications_total";
    pub const DELIVERY_SECONDS: &str = "lounge_delivery_seconds";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::SESSIONS_TOTAL, "Total number of bridge sessions started");
    metrics::describe_gauge!(names::SESSIONS_ACTIVE, "Current number of running sessions");
    metrics::describe_counter!(
        names::SESSION_ENDS_TOTAL,
        "Total number of finished sessions by outcome"
    );
    metrics::describe_counter!(
        names::NOTIFICATIONS_TOTAL,
        "Total number of notification deliveries by outcome"
    );
    metrics::describe_histogram!(
        names::DELIVERY_SECONDS,
        "Notification delivery latency in seconds"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a session start.
pub fn record_session_start() {
    counter!(names::SESSIONS_TOTAL).increment(1);
    gauge!(names::SESSIONS_ACTIVE).increment(1.0);
}

/// Record how a session ended.
pub fn record_session_end(end: &SessionEnd) {
    let outcome = match end {
        SessionEnd::Cancelled => "cancelled",
        SessionEnd::PeerClosed => "peer_closed",
        SessionEnd::Failed(_) => "failed",
    };
    gauge!(names::SESSIONS_ACTIVE).decrement(1.0);
    counter!(names::SESSION_ENDS_TOTAL, "outcome" => outcome).increment(1);
}

/// Notifier wrapper that records delivery outcomes and latency.
pub struct MeteredNotifier<N> {
    inner: N,
}

impl<N> MeteredNotifier<N> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: Notifier> Notifier for MeteredNotifier<N> {
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, DeliveryError> {
        let start = Instant::now();
        let result = self.inner.deliver(notification).await;
        histogram!(names::DELIVERY_SECONDS).record(start.elapsed().as_secs_f64());

        let outcome = if result.is_ok() { "delivered" } else { "failed" };
        counter!(names::NOTIFICATIONS_TOTAL, "outcome" => outcome).increment(1);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    #[async_trait]
    impl Notifier for Fixed {
        async fn deliver(&self, _: &Notification) -> Result<Delivery, DeliveryError> {
            if self.0 >= 400 {
                return Err(DeliveryError::Rejected {
                    status: self.0,
                    body: String::new(),
                });
            }
            Ok(Delivery {
                status: self.0,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_metered_notifier_passes_through() {
        let notification = Notification::new("t", "b");

        let ok = MeteredNotifier::new(Fixed(200));
        assert_eq!(ok.deliver(&notification).await.unwrap().status, 200);

        let rejected = MeteredNotifier::new(Fixed(500));
        assert!(matches!(
            rejected.deliver(&notification).await,
            Err(DeliveryError::Rejected { status: 500, .. })
        ));
    }

    #[test]
    fn test_session_metrics() {
        // Just test that it doesn't panic without a recorder
        record_session_start();
        record_session_end(&SessionEnd::PeerClosed);
    }
}
