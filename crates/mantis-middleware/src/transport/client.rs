//! Authenticated HTTP client for the metrics collector.
//!
//! One `POST <api_url>/metrics` per metric, credential headers attached, no
//! retry. Every call is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;

use mantis_core::auth::AuthCredential;
use mantis_core::error::{MantisError, Result};
use mantis_core::observation::MetricPayload;

use crate::config::{AuthSection, TransportSection};
use crate::transport::{DeliveryOutcome, MetricTransport};

#[derive(Debug, Clone)]
pub struct MetricClient {
    http: reqwest::Client,
    endpoint: String,
    credential: AuthCredential,
}

impl MetricClient {
    pub fn new(credential: AuthCredential, api_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| MantisError::Configuration(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/metrics", api_url.trim_end_matches('/')),
            credential,
        })
    }

    /// Build from config sections; fails when the credential section is
    /// missing both variants.
    pub fn from_config(auth: &AuthSection, transport: &TransportSection) -> Result<Self> {
        let credential = auth.credential()?;
        transport.validate()?;
        Self::new(credential, &transport.api_url, transport.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credential(&self) -> &AuthCredential {
        &self.credential
    }

    /// Deliver one metric and surface the failure, if any.
    pub async fn try_send(&self, name: &str, value: f64) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MantisError::Delivery("metric name must not be empty".into()));
        }
        if !value.is_finite() {
            tracing::warn!(metric = %name, %value, "non-finite metric value is sent as null");
        }

        let mut req = self
            .http
            .post(&self.endpoint)
            .json(&MetricPayload::new(name, value));
        for (header, value) in self.credential.headers() {
            req = req.header(header, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| MantisError::Delivery(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MantisError::Delivery(format!("collector responded {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricTransport for MetricClient {
    async fn send_metric(&self, name: &str, value: f64) -> DeliveryOutcome {
        match self.try_send(name, value).await {
            Ok(()) => {
                tracing::trace!(metric = %name, %value, "metric delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    metric = %name,
                    kind = e.kind().as_str(),
                    auth = self.credential.mode(),
                    error = %e,
                    "metric delivery failed"
                );
                DeliveryOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_core::error::ErrorKind;

    #[test]
    fn endpoint_joins_metrics_path() {
        let c = MetricClient::new(
            AuthCredential::ApiKey("k1".into()),
            "https://collector.example/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(c.endpoint(), "https://collector.example/metrics");
    }

    #[test]
    fn from_config_requires_credentials() {
        let err = MetricClient::from_config(&AuthSection::default(), &TransportSection::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let auth = AuthSection { api_key: Some("k1".into()), ..Default::default() };
        let c = MetricClient::from_config(&auth, &TransportSection::default()).unwrap();
        assert_eq!(c.endpoint(), "https://mantis-backend.onrender.com/metrics");
    }

    #[tokio::test]
    async fn empty_name_fails_without_network() {
        let c = MetricClient::new(
            AuthCredential::ApiKey("k1".into()),
            "http://127.0.0.1:1",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = c.try_send("", 1.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Delivery);
    }
}
