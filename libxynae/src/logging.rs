//! Logging setup shared by the Xynae binaries
//!
//! Diagnostics always go to stderr so stdout stays free for command output
//! (generated posts, stats, JSON exports). The daemon logs at `info` by
//! default; one-shot commands only report errors unless asked.
//!
//! Filter precedence, highest first: `RUST_LOG`, `--verbose`,
//! `XYNAE_LOG_LEVEL`, the binary's default. `XYNAE_LOG_FORMAT` selects
//! `text`, `json` or `pretty` output.
//!
//! ```no_run
//! // Long-running daemon
//! libxynae::logging::init_daemon(false);
//!
//! // One-shot command with --verbose
//! libxynae::logging::init_cli(true);
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at `info` (sqlx logs every statement)
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without target, for terminals and journald
    #[default]
    Text,
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line with source locations, for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                other
            )),
        }
    }
}

/// Resolved logging options for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Level used when neither `RUST_LOG` nor `--verbose` apply
    pub level: String,
    pub verbose: bool,
}

impl LogSettings {
    /// Read `XYNAE_LOG_FORMAT` / `XYNAE_LOG_LEVEL`, falling back to `default_level`
    ///
    /// An unparseable format is reported on stderr and replaced by text.
    pub fn from_env(default_level: &str, verbose: bool) -> Self {
        let format = match std::env::var("XYNAE_LOG_FORMAT") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                eprintln!("{}; using text", e);
                LogFormat::Text
            }),
            Err(_) => LogFormat::Text,
        };
        let level = std::env::var("XYNAE_LOG_LEVEL")
            .ok()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());

        Self {
            format,
            level,
            verbose,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn directives(&self) -> String {
        let base = if self.verbose { "debug" } else { self.level.as_str() };
        std::iter::once(base)
            .chain(QUIET_DEPENDENCIES.iter().copied())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber; later calls are ignored
    pub fn init(&self) {
        let filter = self.filter();
        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .flatten_event(true)
                .with_current_span(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init(),
        };

        if let Err(e) = installed {
            tracing::debug!("Logging already initialized: {}", e);
        }
    }
}

/// Logging for the long-running daemon (`info` by default)
pub fn init_daemon(verbose: bool) {
    LogSettings::from_env("info", verbose).init();
}

/// Logging for one-shot commands (`error` by default)
pub fn init_cli(verbose: bool) {
    LogSettings::from_env("error", verbose).init();
}
