//! Instrumentation config loader (strict parsing).

pub mod schema;

use std::fs;

use mantis_core::error::{MantisError, Result};

pub use schema::{AuthSection, MantisConfig, ServerSection, TransportSection};

pub fn load_from_file(path: &str) -> Result<MantisConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MantisError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MantisConfig> {
    let cfg: MantisConfig = serde_yaml::from_str(s)
        .map_err(|e| MantisError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
