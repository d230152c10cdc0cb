//! Request instrumentor (axum middleware).
//!
//! Lifecycle per request:
//! 1. arrival: start marker captured, `total_requests` incremented, completion
//!    hook armed; all synchronous, nothing awaited;
//! 2. the request runs through the rest of the stack untouched;
//! 3. once the response body is done (or dropped), the hook spawns a detached
//!    task that counts errors, evaluates every metric function in order, then
//!    hands the observations to the transport.
//!
//! Failures in step 3 are logged and counted in [`InstrumentorMetrics`]; they
//! never reach the handler or the client.

pub mod hook;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use futures_util::FutureExt;
use tokio::runtime::Handle;

use mantis_core::auth::AuthCredential;
use mantis_core::error::Result;
use mantis_core::observation::MetricObservation;

use crate::config::schema::default_api_url;
use crate::config::MantisConfig;
use crate::metric::{builtins, MetricContext, MetricFunction, RequestView, ResponseView, StartMarker};
use crate::obs::InstrumentorMetrics;
use crate::state::ProcessMetricState;
use crate::transport::{DeliveryOutcome, MetricClient, MetricTransport};

pub use hook::RequestRecord;
use hook::CompletionGuard;

const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Clone)]
pub struct RequestInstrumentor {
    inner: Arc<Inner>,
}

struct Inner {
    state: Arc<ProcessMetricState>,
    transport: Arc<dyn MetricTransport>,
    /// Caller-supplied functions in configured order, then the built-ins.
    pipeline: Vec<Arc<dyn MetricFunction>>,
    obs: Arc<InstrumentorMetrics>,
}

impl RequestInstrumentor {
    /// Instrumentor delivering to the default collector with `credential`.
    pub fn new(credential: AuthCredential, metrics: Vec<Arc<dyn MetricFunction>>) -> Result<Self> {
        let client = MetricClient::new(credential, &default_api_url(), DEFAULT_TIMEOUT)?;
        Ok(Self::builder(Arc::new(client)).metrics(metrics).build())
    }

    /// Instrumentor built from a loaded config. Rejects configs without a
    /// usable credential.
    pub fn from_config(cfg: &MantisConfig, metrics: Vec<Arc<dyn MetricFunction>>) -> Result<Self> {
        let client = MetricClient::from_config(&cfg.auth, &cfg.transport)?;
        tracing::info!(
            endpoint = %client.endpoint(),
            auth = client.credential().mode(),
            custom_metrics = metrics.len(),
            "request instrumentor configured"
        );
        Ok(Self::builder(Arc::new(client)).metrics(metrics).build())
    }

    /// Start from an already-built transport (which owns the credential).
    pub fn builder(transport: Arc<dyn MetricTransport>) -> InstrumentorBuilder {
        InstrumentorBuilder {
            transport,
            metrics: Vec::new(),
            state: None,
            obs: None,
        }
    }

    pub fn state(&self) -> Arc<ProcessMetricState> {
        Arc::clone(&self.inner.state)
    }

    pub fn observability(&self) -> Arc<InstrumentorMetrics> {
        Arc::clone(&self.inner.obs)
    }

    /// Labels of every metric function in evaluation order.
    pub fn pipeline_labels(&self) -> Vec<&str> {
        self.inner.pipeline.iter().map(|m| m.label()).collect()
    }

    /// Install the middleware on every route of `router`.
    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(self.clone(), track_request))
    }

    /// Arrival bookkeeping: start marker plus request counter.
    pub fn arrive(&self) -> Arc<RequestRecord> {
        let record = Arc::new(RequestRecord::new(StartMarker::now()));
        self.inner.state.record_arrival();
        record
    }

    /// Completion routine for one finished request.
    ///
    /// Counts the error (once per record), evaluates the whole pipeline in
    /// order, then delivers the observations in the same order. No metric
    /// function waits on a delivery. Used by the axum hook; other servers can
    /// call it from their own completion callback.
    pub async fn complete(
        &self,
        record: &RequestRecord,
        request: Arc<RequestView>,
        response: Arc<ResponseView>,
    ) {
        if record.count_error_once(&response, &self.inner.state) {
            tracing::debug!(status = ?response.status, path = %request.path(), "error response counted");
        }

        let ctx = MetricContext {
            request,
            response,
            started: record.started(),
            state: Arc::clone(&self.inner.state),
        };

        let mut observations = Vec::with_capacity(self.inner.pipeline.len());
        for metric in &self.inner.pipeline {
            let evaluated = AssertUnwindSafe(metric.evaluate(&ctx)).catch_unwind().await;
            match evaluated {
                Ok(Ok(Some(obs))) => observations.push(obs),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(metric = %metric.label(), kind = e.kind().as_str(), error = %e, "metric function failed");
                    self.inner
                        .obs
                        .metric_failures
                        .inc(&[("metric", metric.label()), ("cause", "error")]);
                }
                Err(_) => {
                    tracing::error!(metric = %metric.label(), "metric function panicked");
                    self.inner
                        .obs
                        .metric_failures
                        .inc(&[("metric", metric.label()), ("cause", "panic")]);
                }
            }
        }

        for obs in &observations {
            self.dispatch(obs).await;
        }
    }

    async fn dispatch(&self, obs: &MetricObservation) {
        let started = Instant::now();
        let sent = AssertUnwindSafe(self.inner.transport.send_metric(obs.name(), obs.value()))
            .catch_unwind()
            .await;
        let outcome = sent.unwrap_or_else(|_| {
            tracing::error!(metric = %obs.name(), "metric transport panicked");
            DeliveryOutcome::Failed
        });
        self.inner.obs.delivery_duration.observe(&[], started.elapsed());
        self.inner.obs.deliveries.inc(&[("result", outcome.as_str())]);
    }

    fn spawn_completion(
        &self,
        runtime: &Handle,
        record: Arc<RequestRecord>,
        request: Arc<RequestView>,
        response: ResponseView,
    ) {
        let obs = &self.inner.obs;
        obs.hooks_fired.inc(&[("outcome", response.outcome.as_str())]);
        let pending = PendingHook::enter(Arc::clone(obs));

        let this = self.clone();
        let response = Arc::new(response);
        runtime.spawn(async move {
            let _pending = pending;
            this.complete(&record, request, response).await;
        });
    }
}

/// Holds `hooks_pending` raised until the completion task ends, however it ends.
struct PendingHook(Arc<InstrumentorMetrics>);

impl PendingHook {
    fn enter(obs: Arc<InstrumentorMetrics>) -> Self {
        obs.hooks_pending.inc(&[]);
        Self(obs)
    }
}

impl Drop for PendingHook {
    fn drop(&mut self) {
        self.0.hooks_pending.dec(&[]);
    }
}

pub struct InstrumentorBuilder {
    transport: Arc<dyn MetricTransport>,
    metrics: Vec<Arc<dyn MetricFunction>>,
    state: Option<Arc<ProcessMetricState>>,
    obs: Option<Arc<InstrumentorMetrics>>,
}

impl InstrumentorBuilder {
    /// Append one caller-supplied metric function.
    pub fn metric(mut self, metric: Arc<dyn MetricFunction>) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn metrics(mut self, metrics: impl IntoIterator<Item = Arc<dyn MetricFunction>>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Share counters with another instrumentor or a test.
    pub fn state(mut self, state: Arc<ProcessMetricState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn observability(mut self, obs: Arc<InstrumentorMetrics>) -> Self {
        self.obs = Some(obs);
        self
    }

    pub fn build(self) -> RequestInstrumentor {
        let mut pipeline = self.metrics;
        pipeline.extend(builtins());

        RequestInstrumentor {
            inner: Arc::new(Inner {
                state: self.state.unwrap_or_default(),
                transport: self.transport,
                pipeline,
                obs: self.obs.unwrap_or_default(),
            }),
        }
    }
}

/// Middleware function for `axum::middleware::from_fn_with_state`.
///
/// Always forwards the request; metric work happens after the response.
pub async fn track_request(
    State(instrumentor): State<RequestInstrumentor>,
    req: Request,
    next: Next,
) -> Response {
    let record = instrumentor.arrive();
    let view = RequestView {
        method: req.method().clone(),
        uri: req.uri().clone(),
        version: req.version(),
        headers: req.headers().clone(),
    };
    let guard = CompletionGuard::arm(instrumentor, record, view);

    let response = next.run(req).await;
    guard.attach(response)
}
