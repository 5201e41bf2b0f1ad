//! HTTP responder
//!
//! Posts `{"message": ...}` as JSON to the configured endpoint.

use super::{ChatRequest, ChatResponse, Responder};
use crate::config::ResponderConfig;
use crate::{FluentError, Result};
use async_trait::async_trait;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct HttpResponder {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FluentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        info!("Responder endpoint: {}", config.endpoint);

        Ok(Self {
            endpoint: config.endpoint.clone(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| FluentError::TransportError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FluentError::TransportError(format!(
                "Failed to fetch from API. Status: {}. Error: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body = response.text().await.map_err(|e| {
            FluentError::TransportError(format!("Failed to read response body: {}", e))
        })?;
        debug!(bytes = body.len(), "Response body received");

        parse_response(&body)
    }
}

/// Decode a response body
pub fn parse_response(body: &str) -> Result<ChatResponse> {
    serde_json::from_str(body)
        .map_err(|e| FluentError::ProtocolError(format!("Malformed response body: {}", e)))
}
