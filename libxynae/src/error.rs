//! Error types for Xynae

use thiserror::Error;

pub type Result<T> = std::result::Result<T, XynaeError>;

/// Result type used by LLM backends and the provider manager
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug)]
pub enum XynaeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl XynaeError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            XynaeError::InvalidInput(_) => 3,
            XynaeError::Platform(PlatformError::Authentication(_)) => 2,
            XynaeError::Provider(ProviderError::NoProviderConfigured) => 2,
            XynaeError::Config(_) => 2,
            XynaeError::Platform(_) => 1,
            XynaeError::Provider(_) => 1,
            XynaeError::Database(_) => 1,
        }
    }

    /// Whether this error came from the social platform
    ///
    /// Platform failures are part of normal operation (the post is recorded
    /// as unposted, the mention is retried); anything else reaching the
    /// scheduler is treated as an unexpected loop-level failure.
    pub fn is_platform(&self) -> bool {
        matches!(self, XynaeError::Platform(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unexpected response: {0}")]
    Response(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Credentials or configuration missing; the backend is excluded at startup
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("No LLM providers configured. Set at least one of ANTHROPIC_API_KEY, OPENAI_API_KEY, GOOGLE_API_KEY or GEMINI_API_KEY")]
    NoProviderConfigured,

    #[error("Provider '{name}' not available. Available: {}", available.join(", "))]
    NotAvailable { name: String, available: Vec<String> },

    #[error("{provider} generation failed: {message}")]
    Generation { provider: String, message: String },

    #[error("All LLM providers failed (tried: {}). Last error: {last_error}", tried.join(", "))]
    AllProvidersFailed {
        tried: Vec<String>,
        last_error: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Build a generation error for the named provider
    pub fn generation(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::Generation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
