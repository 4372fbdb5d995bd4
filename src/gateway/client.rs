//! Xendit invoice API client
//!
//! Single bounded-timeout call per user action; failures surface to the
//! caller and are never retried here.

use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::XenditConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::types::{extract_redirect_url, InvoiceRequest};

pub struct XenditClient {
    http: Client,
    base_url: String,
    api_version: String,
    secret_key: String,
}

impl XenditClient {
    pub fn new(config: &XenditConfig) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| GatewayError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Create a hosted invoice and return its checkout redirect URL together
    /// with the raw provider response.
    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> GatewayResult<(String, JsonValue)> {
        let url = format!("{}/v2/invoices", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, Some(""))
            .header("x-api-version", &self.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Network {
                message: format!("invoice request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                status = %status,
                external_id = %request.external_id,
                "invoice creation rejected by provider"
            );
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: JsonValue =
            serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse {
                message: format!("invalid provider JSON response: {}", e),
            })?;

        let redirect_url = extract_redirect_url(&parsed).ok_or(GatewayError::MissingRedirectUrl)?;

        info!(external_id = %request.external_id, "invoice created");
        Ok((redirect_url, parsed))
    }
}
