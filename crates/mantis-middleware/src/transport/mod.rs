//! Metric delivery.
//!
//! `MetricTransport` is the seam between the instrumentor and the network:
//! the HTTP client in [`client`] is the production implementation, tests
//! substitute their own.

pub mod client;

use async_trait::async_trait;

pub use client::MetricClient;

/// Result of one delivery attempt, reported for self-metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "ok",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

/// Sends one named value to the collector.
///
/// Implementations never return an error: every failure is logged and
/// reported as [`DeliveryOutcome::Failed`].
#[async_trait]
pub trait MetricTransport: Send + Sync {
    async fn send_metric(&self, name: &str, value: f64) -> DeliveryOutcome;
}
