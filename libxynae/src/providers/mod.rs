//! LLM provider abstraction and fallback manager
//!
//! Each backend implements [`Provider`]. The [`ProviderManager`] is built once
//! at startup from whichever backends have credentials, then routes every
//! generation to a selected backend and walks the rest in registration order
//! when it fails.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{ProviderError, ProviderResult};

pub mod anthropic;
pub mod gemini;
pub mod openai;

// Mock provider is available for all builds (not just tests) to support integration tests
pub mod mock;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Parameters for a single text generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }

    /// Request with a temperature drawn uniformly from [0.8, 1.0]
    pub fn sampled<R: Rng + ?Sized>(
        prompt: impl Into<String>,
        max_tokens: u32,
        rng: &mut R,
    ) -> Self {
        Self::new(prompt, max_tokens, rng.gen_range(0.8..=1.0))
    }
}

/// Text produced by a provider, tagged with the backend that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    pub provider: String,
}

/// A text-generation backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Lowercase identifier ("anthropic", "openai", "gemini")
    fn name(&self) -> &str;

    /// Whether the backend has what it needs to serve requests
    fn is_available(&self) -> bool;

    /// Generate text for the prompt
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Generation` when the backend call fails or
    /// returns no usable text.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String>;
}

/// Which provider to try first when the caller gives no hint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderPreference {
    #[default]
    Auto,
    Named(String),
}

impl From<&str> for ProviderPreference {
    fn from(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        if value.is_empty() || value == "auto" {
            ProviderPreference::Auto
        } else {
            ProviderPreference::Named(value)
        }
    }
}

/// Registry of usable providers with ordered fallback
pub struct ProviderManager {
    providers: Vec<Box<dyn Provider>>,
    preferred: ProviderPreference,
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("providers", &self.names())
            .field("preferred", &self.preferred)
            .finish()
    }
}

impl ProviderManager {
    /// Build the registry from construction attempts, in registration order
    ///
    /// Candidates that failed to construct or report themselves unavailable
    /// are logged and excluded.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NoProviderConfigured` when nothing usable remains.
    pub fn from_candidates(
        candidates: Vec<ProviderResult<Box<dyn Provider>>>,
        preferred: ProviderPreference,
    ) -> ProviderResult<Self> {
        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        for candidate in candidates {
            match candidate {
                Ok(provider) if provider.is_available() => {
                    info!("LLM provider registered: {}", provider.name());
                    providers.push(provider);
                }
                Ok(provider) => {
                    warn!("LLM provider {} reports unavailable, skipping", provider.name());
                }
                Err(e) => {
                    warn!("Skipping LLM provider: {}", e);
                }
            }
        }

        if providers.is_empty() {
            return Err(ProviderError::NoProviderConfigured);
        }

        if let ProviderPreference::Named(name) = &preferred {
            if !providers.iter().any(|p| p.name() == name.as_str()) {
                warn!(
                    "Preferred provider {} not available, using {}",
                    name,
                    providers[0].name()
                );
            }
        }

        Ok(Self {
            providers,
            preferred,
        })
    }

    /// Build the built-in backends (anthropic, openai, gemini) from the environment
    pub fn from_config(config: &LlmConfig) -> ProviderResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let candidates: Vec<ProviderResult<Box<dyn Provider>>> = vec![
            AnthropicProvider::from_env(&config.anthropic_model, timeout)
                .map(|p| Box::new(p) as Box<dyn Provider>),
            OpenAiProvider::from_env(&config.openai_model, timeout)
                .map(|p| Box::new(p) as Box<dyn Provider>),
            GeminiProvider::from_env(&config.gemini_model, timeout)
                .map(|p| Box::new(p) as Box<dyn Provider>),
        ];

        Self::from_candidates(candidates, ProviderPreference::from(config.provider.as_str()))
    }

    /// Registered provider names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn preferred(&self) -> &ProviderPreference {
        &self.preferred
    }

    /// Name of the provider a hint-less generation would try first
    pub fn current(&self) -> Option<&str> {
        self.select(None).ok().map(|i| self.providers[i].name())
    }

    /// Generate with the default selection
    pub async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GeneratedText> {
        self.generate_with(request, None).await
    }

    /// Generate, starting from `hint` when given
    ///
    /// # Errors
    ///
    /// - `ProviderError::NotAvailable` if `hint` names an unregistered provider
    /// - `ProviderError::AllProvidersFailed` once every registered provider
    ///   has been tried exactly once
    pub async fn generate_with(
        &self,
        request: &GenerationRequest,
        hint: Option<&str>,
    ) -> ProviderResult<GeneratedText> {
        let first = self.select(hint)?;
        let order = std::iter::once(first)
            .chain((0..self.providers.len()).filter(|&i| i != first));

        let mut tried = Vec::new();
        let mut last_error = None;

        for index in order {
            let provider = &self.providers[index];
            debug!("Generating with {}", provider.name());

            match provider.generate(request).await {
                Ok(text) => {
                    if !tried.is_empty() {
                        info!(
                            "Generated with fallback provider {} after {} failure(s)",
                            provider.name(),
                            tried.len()
                        );
                    }
                    return Ok(GeneratedText {
                        text,
                        provider: provider.name().to_string(),
                    });
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    tried.push(provider.name().to_string());
                    last_error = Some(e);
                }
            }
        }

        Err(ProviderError::AllProvidersFailed {
            tried,
            last_error: Box::new(last_error.unwrap_or(ProviderError::NoProviderConfigured)),
        })
    }

    fn select(&self, hint: Option<&str>) -> ProviderResult<usize> {
        if let Some(hint) = hint {
            let hint = hint.trim().to_lowercase();
            return self
                .position(&hint)
                .ok_or_else(|| ProviderError::NotAvailable {
                    name: hint,
                    available: self.names(),
                });
        }

        if let ProviderPreference::Named(name) = &self.preferred {
            if let Some(index) = self.position(name) {
                return Ok(index);
            }
        }

        Ok(0)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.providers
            .iter()
            .position(|p| p.name() == name && p.is_available())
    }
}
