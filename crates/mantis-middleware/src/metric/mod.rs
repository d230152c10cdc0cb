//! Metric functions: the pluggable units evaluated after each response.
//!
//! A metric function looks at the finished request/response pair and the
//! request's start marker and produces at most one observation. Built-ins live
//! in [`builtin`]; callers add their own by implementing [`MetricFunction`] or
//! wrapping an async closure with [`metric_fn`].

pub mod builtin;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode, Uri, Version};

use mantis_core::error::Result;
use mantis_core::observation::MetricObservation;

use crate::state::ProcessMetricState;

pub use builtin::{builtins, ErrorRateMetric, LatencyMetric, ThroughputMetric};

/// Monotonic timestamp captured when a request arrives.
#[derive(Debug, Clone, Copy)]
pub struct StartMarker(Instant);

impl StartMarker {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Request data captured before the request is handed downstream.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestView {
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// How the response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Body streamed to end.
    Completed,
    /// Body or request dropped early (client went away, handler cancelled).
    Aborted,
}

impl ResponseOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseOutcome::Completed => "completed",
            ResponseOutcome::Aborted => "aborted",
        }
    }
}

/// Response data as seen by the completion hook.
#[derive(Debug, Clone)]
pub struct ResponseView {
    /// `None` when the request was dropped before any response existed.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub outcome: ResponseOutcome,
    /// When the completion hook fired.
    pub finished: Instant,
}

impl ResponseView {
    /// Status code 400 or above.
    pub fn is_error(&self) -> bool {
        self.status.is_some_and(|s| s.as_u16() >= 400)
    }

    /// Time from arrival to completion, independent of when it is read.
    pub fn elapsed_since(&self, started: StartMarker) -> Duration {
        self.finished.saturating_duration_since(started.instant())
    }
}

/// Everything a metric function may look at. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MetricContext {
    pub request: Arc<RequestView>,
    pub response: Arc<ResponseView>,
    pub started: StartMarker,
    pub state: Arc<ProcessMetricState>,
}

#[async_trait]
pub trait MetricFunction: Send + Sync {
    /// Name used in logs and failure counters.
    fn label(&self) -> &str;

    /// `Ok(None)` means "nothing to report for this request".
    async fn evaluate(&self, ctx: &MetricContext) -> Result<Option<MetricObservation>>;
}

/// Adapter turning an async closure into a [`MetricFunction`].
pub struct FnMetric<F> {
    label: String,
    f: F,
}

#[async_trait]
impl<F, Fut> MetricFunction for FnMetric<F>
where
    F: Fn(MetricContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<MetricObservation>>> + Send,
{
    fn label(&self) -> &str {
        &self.label
    }

    async fn evaluate(&self, ctx: &MetricContext) -> Result<Option<MetricObservation>> {
        (self.f)(ctx.clone()).await
    }
}

/// Wrap an async closure as a shareable metric function.
///
/// ```ignore
/// let slow = metric_fn("slow_requests", |ctx| async move {
///     let ms = ctx.response.elapsed_since(ctx.started).as_secs_f64() * 1000.0;
///     if ms > 500.0 { MetricObservation::new("slow_request_ms", ms).map(Some) } else { Ok(None) }
/// });
/// ```
pub fn metric_fn<F, Fut>(label: impl Into<String>, f: F) -> Arc<dyn MetricFunction>
where
    F: Fn(MetricContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<MetricObservation>>> + Send + 'static,
{
    Arc::new(FnMetric {
        label: label.into(),
        f,
    })
}
