//! Shared application state for the demo server.

use std::sync::Arc;

use mantis_core::error::Result;

use crate::config::MantisConfig;
use crate::instrument::RequestInstrumentor;
use crate::metric::MetricFunction;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    instrumentor: RequestInstrumentor,
}

struct AppStateInner {
    cfg: MantisConfig,
}

impl AppState {
    /// Build state; fails when the config carries no usable credential.
    pub fn new(cfg: MantisConfig, metrics: Vec<Arc<dyn MetricFunction>>) -> Result<Self> {
        let instrumentor = RequestInstrumentor::from_config(&cfg, metrics)?;
        Ok(Self::with_instrumentor(cfg, instrumentor))
    }

    pub fn with_instrumentor(cfg: MantisConfig, instrumentor: RequestInstrumentor) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cfg }),
            instrumentor,
        }
    }

    pub fn cfg(&self) -> &MantisConfig {
        &self.inner.cfg
    }

    pub fn instrumentor(&self) -> &RequestInstrumentor {
        &self.instrumentor
    }
}
