//! Built-in metrics, always evaluated after caller-supplied ones and in this
//! order: latency, throughput, error rate.

use std::sync::Arc;

use async_trait::async_trait;

use mantis_core::error::Result;
use mantis_core::observation::MetricObservation;

use super::{MetricContext, MetricFunction};

pub const LATENCY: &str = "latency";
pub const REQUESTS_PER_SECOND: &str = "requests_per_second";
pub const ERROR_RATE: &str = "error_rate";

/// Milliseconds from the start marker to the completion hook firing.
pub struct LatencyMetric;

#[async_trait]
impl MetricFunction for LatencyMetric {
    fn label(&self) -> &str {
        LATENCY
    }

    async fn evaluate(&self, ctx: &MetricContext) -> Result<Option<MetricObservation>> {
        let ms = ctx.response.elapsed_since(ctx.started).as_secs_f64() * 1000.0;
        MetricObservation::new(LATENCY, ms).map(Some)
    }
}

/// Requests received per second since the window start (cumulative).
pub struct ThroughputMetric;

#[async_trait]
impl MetricFunction for ThroughputMetric {
    fn label(&self) -> &str {
        REQUESTS_PER_SECOND
    }

    async fn evaluate(&self, ctx: &MetricContext) -> Result<Option<MetricObservation>> {
        let rps = ctx.state.snapshot().requests_per_second();
        MetricObservation::new(REQUESTS_PER_SECOND, rps).map(Some)
    }
}

/// Error responses as a percentage of requests received.
pub struct ErrorRateMetric;

#[async_trait]
impl MetricFunction for ErrorRateMetric {
    fn label(&self) -> &str {
        ERROR_RATE
    }

    async fn evaluate(&self, ctx: &MetricContext) -> Result<Option<MetricObservation>> {
        let rate = ctx.state.snapshot().error_rate();
        MetricObservation::new(ERROR_RATE, rate).map(Some)
    }
}

pub fn builtins() -> Vec<Arc<dyn MetricFunction>> {
    vec![
        Arc::new(LatencyMetric),
        Arc::new(ThroughputMetric),
        Arc::new(ErrorRateMetric),
    ]
}
