//! xyn-run - Autonomous posting daemon
//!
//! Builds an agent from configuration and drives the scheduler loop:
//! scheduled posts on one interval, mention checks on another, until
//! SIGINT or SIGTERM.

use clap::Parser;
use libxynae::{Agent, Clock, Config, Result, Scheduler, SystemClock};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "xyn-run")]
#[command(version)]
#[command(about = "Autonomous posting daemon")]
#[command(long_about = "\
xyn-run - Autonomous posting daemon

DESCRIPTION:
    xyn-run composes posts with the first available LLM provider, publishes
    them to X on a fixed interval, and replies to new mentions at most once
    each. Activity is recorded in a local SQLite store when one is available.

    Without an X access token the daemon still generates and records posts
    but publishes nothing. Without a database, replied mentions are tracked
    in memory for the lifetime of the process.

USAGE:
    # Run in foreground (logs to stderr)
    xyn-run

    # Post every hour, check mentions every ten minutes
    xyn-run --post-interval 1h --check-interval 10m

    # Prefer a specific provider
    xyn-run --provider openai

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current step)

ENVIRONMENT:
    ANTHROPIC_API_KEY, OPENAI_API_KEY, GOOGLE_API_KEY / GEMINI_API_KEY
    X_ACCESS_TOKEN
    XYNAE_CONFIG, XYNAE_LOG_FORMAT, XYNAE_LOG_LEVEL

CONFIGURATION:
    Configuration file: ~/.config/xynae/config.toml
    Database location: ~/.local/share/xynae/activity.db

    [schedule]
    post_interval = 1200   # seconds between posts
    check_interval = 300   # seconds between mention checks

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error or no LLM provider
    3 - Invalid input
")]
struct Cli {
    /// Configuration file (default: $XYNAE_CONFIG or ~/.config/xynae/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preferred LLM provider (anthropic, openai, gemini or auto)
    #[arg(short, long)]
    provider: Option<String>,

    /// Time between scheduled posts, e.g. "20m" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    post_interval: Option<Duration>,

    /// Time between mention checks, e.g. "5m" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    check_interval: Option<Duration>,

    /// Run without the activity store
    #[arg(long, conflicts_with = "database")]
    no_database: bool,

    /// Activity store location (overrides config)
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// File containing a custom personality prompt
    #[arg(long, value_name = "FILE")]
    personality_file: Option<String>,

    /// Run a single iteration and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv = libxynae::config::load_dotenv();
    libxynae::logging::init_daemon(cli.verbose);
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let agent = Agent::from_config(&config, Arc::clone(&clock)).await?;

    info!(
        "Xynae starting: providers [{}], social client {}, dedup {}",
        agent.providers().names().join(", "),
        if agent.has_social_client() { "connected" } else { "disabled" },
        if agent.persistent_dedup() { "persistent" } else { "in-memory" }
    );

    let post_interval = cli
        .post_interval
        .unwrap_or(Duration::from_secs(config.schedule.post_interval));
    let check_interval = cli
        .check_interval
        .unwrap_or(Duration::from_secs(config.schedule.check_interval));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(Arc::clone(&shutdown))?;

    let mut scheduler =
        Scheduler::new(agent, clock, post_interval, check_interval).with_shutdown(shutdown);

    if cli.once {
        let outcome = scheduler.tick().await;
        scheduler.finish().await;
        outcome?;
        info!("xyn-run: single iteration complete, exiting");
    } else {
        scheduler.run().await;
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(provider) = &cli.provider {
        config.llm.provider = provider.clone();
    }
    if cli.no_database {
        config.database.enabled = false;
    }
    if let Some(path) = &cli.database {
        config.database.enabled = true;
        config.database.path = path.clone();
    }
    if let Some(path) = &cli.personality_file {
        config.agent.personality_file = Some(path.clone());
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::sync::atomic::Ordering;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libxynae::XynaeError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, stopping gracefully...", sig);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "xyn-run",
            "--provider",
            "gemini",
            "--no-database",
            "--personality-file",
            "/tmp/persona.txt",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.llm.provider, "gemini");
        assert!(!config.database.enabled);
        assert_eq!(
            config.agent.personality_file.as_deref(),
            Some("/tmp/persona.txt")
        );
    }

    #[test]
    fn test_database_path_override_enables_store() {
        let cli = Cli::parse_from(["xyn-run", "--database", "/tmp/xynae.db"]);
        let mut config = Config::default();
        config.database.enabled = false;
        apply_overrides(&mut config, &cli);

        assert!(config.database.enabled);
        assert_eq!(config.database.path, "/tmp/xynae.db");
    }

    #[test]
    fn test_human_durations() {
        let cli = Cli::parse_from(["xyn-run", "--post-interval", "20m", "--check-interval", "90s"]);
        assert_eq!(cli.post_interval, Some(Duration::from_secs(1200)));
        assert_eq!(cli.check_interval, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_no_database_conflicts_with_path() {
        let result = Cli::try_parse_from(["xyn-run", "--no-database", "--database", "x.db"]);
        assert!(result.is_err());
    }
}
