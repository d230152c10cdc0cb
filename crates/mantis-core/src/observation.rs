//! Metric observations and their wire payload.
//!
//! An observation is a single named value produced for one request. It is
//! handed straight to the delivery client and never stored.

use serde::Serialize;

use crate::error::{MantisError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct MetricObservation {
    name: String,
    value: f64,
}

impl MetricObservation {
    /// Build an observation. The name must not be empty; the value is taken
    /// as-is (non-finite values are still delivered, see [`MetricPayload`]).
    pub fn new(name: impl Into<String>, value: f64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MantisError::metric("<unnamed>", "metric name must not be empty"));
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// JSON body of `POST <api_url>/metrics`.
///
/// JSON has no NaN or Infinity; `serde_json` writes those as `null`.
#[derive(Debug, Serialize)]
pub struct MetricPayload<'a> {
    pub metric: &'a str,
    pub value: f64,
}

impl<'a> MetricPayload<'a> {
    pub fn new(metric: &'a str, value: f64) -> Self {
        Self { metric, value }
    }
}
