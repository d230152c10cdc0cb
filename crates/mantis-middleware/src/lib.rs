//! mantis middleware library entry.
//!
//! Request instrumentation for axum services: per-request latency,
//! throughput and error-rate metrics plus caller-supplied ones, delivered
//! asynchronously to the mantis collector. Consumed by the demo binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod instrument;
pub mod metric;
pub mod obs;
pub mod ops;
pub mod router;
pub mod state;
pub mod transport;

pub use instrument::{track_request, InstrumentorBuilder, RequestInstrumentor};
pub use metric::{metric_fn, MetricContext, MetricFunction};
pub use state::ProcessMetricState;
pub use transport::{DeliveryOutcome, MetricClient, MetricTransport};
