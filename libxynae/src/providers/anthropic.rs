//! Anthropic Messages API backend

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::env_secret;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{GenerationRequest, Provider};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";

const NAME: &str = "anthropic";

pub struct AnthropicProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    api_url: String,
}

impl AnthropicProvider {
    /// Create a provider from `ANTHROPIC_API_KEY`
    pub fn from_env(model: &str, timeout: Duration) -> ProviderResult<Self> {
        let api_key = env_secret(&["ANTHROPIC_API_KEY"])
            .ok_or_else(|| ProviderError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;
        Self::with_api_key(api_key, model, timeout)
    }

    pub fn with_api_key(
        api_key: SecretString,
        model: &str,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Override the endpoint (proxies, tests)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        })
    }
}

/// Concatenate the text blocks of a Messages API response
fn parse_response(body: &Value) -> ProviderResult<String> {
    let text: String = body["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::generation(NAME, "response contained no text"));
    }
    Ok(text.to_string())
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::generation(NAME, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::generation(NAME, format!("HTTP {}: {}", status, text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::generation(NAME, format!("invalid response: {}", e)))?;

        parse_response(&body)
    }
}
