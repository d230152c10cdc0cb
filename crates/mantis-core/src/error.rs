//! Shared error type across mantis crates.

use thiserror::Error;

/// Stable error categories, used in logs and self-metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or contradictory setup (credentials, config file).
    Configuration,
    /// A metric could not be delivered to the collector.
    Delivery,
    /// A metric function failed to produce its value.
    MetricComputation,
    /// Unexpected local failure.
    Internal,
}

impl ErrorKind {
    /// String representation used in log fields and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Delivery => "DELIVERY",
            ErrorKind::MetricComputation => "METRIC_COMPUTATION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MantisError>;

/// Unified error type used by core and middleware.
///
/// Only `Configuration` ever reaches a caller; the other variants are
/// absorbed on the request path and reported through logs.
#[derive(Debug, Error)]
pub enum MantisError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("metric {metric} failed: {reason}")]
    MetricComputation { metric: String, reason: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl MantisError {
    /// Map the error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MantisError::Configuration(_) => ErrorKind::Configuration,
            MantisError::Delivery(_) => ErrorKind::Delivery,
            MantisError::MetricComputation { .. } => ErrorKind::MetricComputation,
            MantisError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a metric function failure.
    pub fn metric(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        MantisError::MetricComputation {
            metric: metric.into(),
            reason: reason.into(),
        }
    }
}
