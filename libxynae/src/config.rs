//! Configuration management for Xynae
//!
//! Non-secret settings live in a TOML file. API keys and access tokens are
//! only ever read from the environment (optionally populated from `.env`).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub schedule: ScheduleConfig,
    pub agent: AgentConfig,
    pub x: XConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.local/share/xynae/activity.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Preferred provider name, or "auto"
    pub provider: String,
    pub anthropic_model: String,
    pub openai_model: String,
    pub gemini_model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            anthropic_model: "claude-sonnet-4-20250514".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between generated posts
    pub post_interval: u64,
    /// Seconds between mention checks
    pub check_interval: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            post_interval: 1200,
            check_interval: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// File containing a custom personality prompt
    pub personality_file: Option<String>,
    /// Starting network size used in post context (random when unset)
    pub network_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_mentions: usize,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com/2".to_string(),
            timeout_secs: 30,
            max_mentions: 10,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: built-in defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load from `path` when given (it must exist), otherwise as [`Config::load`]
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Read the personality prompt referenced by `[agent] personality_file`
    pub fn load_personality(&self) -> Result<Option<String>> {
        match &self.agent.personality_file {
            Some(path) => read_personality_file(path).map(Some),
            None => Ok(None),
        }
    }
}

/// Read a personality prompt from disk (tilde-expanded)
pub fn read_personality_file(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();
    let content = std::fs::read_to_string(&expanded).map_err(ConfigError::ReadError)?;
    if content.trim().is_empty() {
        return Err(ConfigError::MissingField(format!("personality text in {}", expanded)).into());
    }
    Ok(content)
}

/// Resolve the configuration file path (XDG config dir unless overridden)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("XYNAE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("xynae").join("config.toml"))
}

/// Populate the process environment from a `.env` file if one exists
///
/// Runs before logging is initialized so `.env` can set `XYNAE_LOG_FORMAT`
/// and `XYNAE_LOG_LEVEL`. Returns the file that was loaded; an unreadable
/// file is reported on stderr.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            eprintln!("Ignoring unreadable .env file: {}", e);
            None
        }
    }
}

/// Read the first non-empty environment variable among `names`
pub fn env_secret(names: &[&str]) -> Option<SecretString> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(SecretString::from)
}
