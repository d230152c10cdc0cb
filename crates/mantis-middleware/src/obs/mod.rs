//! Observability for the instrumentation layer itself.
//!
//! Metric delivery failures never reach the request path, so they are
//! counted here and rendered by the `/metrics` handler.

pub mod metrics;

pub use metrics::InstrumentorMetrics;
