//! Shared HTTP plumbing for collaborator clients

use crate::error::KycError;
use crate::Result;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pooled client bound to one collaborator's base URL.
#[derive(Clone)]
pub(crate) struct ServiceClient {
    service: &'static str,
    client: Client,
    base_url: String,
}

impl ServiceClient {
    pub(crate) fn new(service: &'static str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KycError::ConfigError(format!("{} client: {}", service, e)))?;

        Ok(Self {
            service,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Send a prepared request, failing on transport errors and non-2xx statuses.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| KycError::collaborator(self.service, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KycError::collaborator(
                self.service,
                format!("API request failed with {}: {}", status, text),
            ));
        }

        Ok(response)
    }

    /// Send a prepared request and return its JSON body (`Null` when empty).
    pub(crate) async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let text = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| KycError::collaborator(self.service, format!("unreadable response: {}", e)))?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| KycError::collaborator(self.service, format!("invalid JSON response: {}", e)))
    }
}

/// Unwrap a credential or fail the call as unconfigured.
pub(crate) fn require<'a>(service: &'static str, value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KycError::collaborator(service, format!("{} is not configured", name)))
}
