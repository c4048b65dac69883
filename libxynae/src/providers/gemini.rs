//! Google Gemini backend

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::env_secret;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{GenerationRequest, Provider};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const NAME: &str = "gemini";

pub struct GeminiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

impl GeminiProvider {
    /// Create a provider from `GOOGLE_API_KEY` or `GEMINI_API_KEY`
    pub fn from_env(model: &str, timeout: Duration) -> ProviderResult<Self> {
        let api_key = env_secret(&["GOOGLE_API_KEY", "GEMINI_API_KEY"]).ok_or_else(|| {
            ProviderError::Unavailable("GOOGLE_API_KEY or GEMINI_API_KEY not set".to_string())
        })?;
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
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn build_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

fn parse_response(parsed: GeminiResponse) -> ProviderResult<String> {
    if let Some(error) = parsed.error {
        return Err(ProviderError::generation(
            NAME,
            format!("API error: {}", error.message),
        ));
    }

    let text: String = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::generation(NAME, "response contained no text"));
    }
    Ok(text.to_string())
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let response = self
            .client
            .post(self.build_url())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::generation(NAME, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::generation(NAME, format!("HTTP {}: {}", status, text)));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::generation(NAME, format!("invalid response: {}", e)))?;

        parse_response(parsed)
    }
}
