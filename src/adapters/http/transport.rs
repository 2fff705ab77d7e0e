//! reqwest transport. Implements DeliveryTransport by POSTing JSON to the endpoint.

use crate::domain::{DomainError, LocationPayload};
use crate::ports::DeliveryTransport;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// HTTP adapter for the telemetry endpoint.
///
/// No authentication; the body is the JSON payload and reqwest sets
/// `Content-Type: application/json`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geo-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Transport(format!("client init failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post_json(&self, url: &str, payload: &LocationPayload) -> Result<u16, DomainError> {
        let url = Url::parse(url).map_err(|e| {
            DomainError::ConfigurationInvalid(format!("invalid endpoint URL '{}': {}", url, e))
        })?;

        let res = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        debug!(%url, status = status.as_u16(), "endpoint responded");
        Ok(status.as_u16())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DomainError {
    debug!(error = %e, "request failed");
    if e.is_timeout() {
        DomainError::Transport("request timed out".to_string())
    } else if e.is_connect() {
        DomainError::Transport(format!("network error: {}", e))
    } else if e.is_builder() {
        DomainError::ConfigurationInvalid(format!("request could not be built: {}", e))
    } else {
        DomainError::Transport(e.to_string())
    }
}
