use std::time::Duration;

use serde::Deserialize;

use mantis_core::auth::{AuthCredential, AuthProvider};
use mantis_core::error::{MantisError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MantisConfig {
    pub version: u32,

    pub auth: AuthSection,

    #[serde(default)]
    pub transport: TransportSection,

    #[serde(default)]
    pub server: ServerSection,
}

impl MantisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MantisError::Configuration(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.auth.credential()?; // reject before anything is built
        self.transport.validate()?;

        Ok(())
    }
}

/// Credential options as written in the file. Exactly one of `api_key` or
/// `token` + `provider` must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub provider: Option<AuthProvider>,
}

impl AuthSection {
    pub fn credential(&self) -> Result<AuthCredential> {
        AuthCredential::resolve(self.api_key.as_deref(), self.token.as_deref(), self.provider)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(MantisError::Configuration(
                "transport.api_url must start with http:// or https://".into(),
            ));
        }
        if !(100..=60000).contains(&self.timeout_ms) {
            return Err(MantisError::Configuration(
                "transport.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

pub fn default_api_url() -> String {
    "https://mantis-backend.onrender.com".into()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
