//! Credential variants accepted by the metric collector.
//!
//! A credential is either an API key or an OAuth bearer token bound to the
//! provider that issued it. The two are mutually exclusive for one client or
//! middleware instance and never change after construction.

use std::fmt;

use serde::Deserialize;

use crate::error::{MantisError, Result};

/// OAuth identity providers the collector accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Github,
}

impl AuthProvider {
    /// Value sent in the `X-Auth-Provider` header.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }
}

impl std::str::FromStr for AuthProvider {
    type Err = MantisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "google" => Ok(AuthProvider::Google),
            "github" => Ok(AuthProvider::Github),
            other => Err(MantisError::Configuration(format!(
                "unknown auth provider: {other} (expected google or github)"
            ))),
        }
    }
}

/// Validated credential. Construct through [`AuthCredential::resolve`] or the
/// typed constructors; an instance always holds exactly one variant.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthCredential {
    ApiKey(String),
    OAuth { token: String, provider: AuthProvider },
}

impl AuthCredential {
    pub fn api_key(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(MantisError::Configuration("api key must not be empty".into()));
        }
        Ok(AuthCredential::ApiKey(key))
    }

    pub fn oauth(token: impl Into<String>, provider: AuthProvider) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(MantisError::Configuration("oauth token must not be empty".into()));
        }
        Ok(AuthCredential::OAuth { token, provider })
    }

    /// Pick the credential variant from loosely-populated options.
    ///
    /// Empty strings count as absent. Exactly one of `api_key` or the
    /// `(token, provider)` pair must be present.
    pub fn resolve(
        api_key: Option<&str>,
        token: Option<&str>,
        provider: Option<AuthProvider>,
    ) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let token = token.filter(|t| !t.trim().is_empty());

        match (api_key, token, provider) {
            (Some(_), Some(_), _) => Err(MantisError::Configuration(
                "api key and oauth token are mutually exclusive".into(),
            )),
            (Some(key), None, _) => Self::api_key(key),
            (None, Some(token), Some(provider)) => Self::oauth(token, provider),
            (None, Some(_), None) => Err(MantisError::Configuration(
                "oauth token requires an auth provider".into(),
            )),
            (None, None, _) => Err(MantisError::Configuration(
                "either an api key or a token and auth provider is required".into(),
            )),
        }
    }

    /// Header pairs to attach to every outbound call.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            AuthCredential::ApiKey(key) => vec![("X-API-Key", key.clone())],
            AuthCredential::OAuth { token, provider } => vec![
                ("Authorization", format!("Bearer {token}")),
                ("X-Auth-Provider", provider.as_str().to_string()),
            ],
        }
    }

    /// Short label for logs; never includes the secret.
    pub fn mode(&self) -> &'static str {
        match self {
            AuthCredential::ApiKey(_) => "api_key",
            AuthCredential::OAuth { .. } => "oauth",
        }
    }
}

// Secrets stay out of Debug output.
impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthCredential::ApiKey(_) => f.write_str("ApiKey(***)"),
            AuthCredential::OAuth { provider, .. } => f
                .debug_struct("OAuth")
                .field("token", &"***")
                .field("provider", provider)
                .finish(),
        }
    }
}
