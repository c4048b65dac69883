//! xyn-status - Report what a running agent would have available

use anyhow::{Context, Result};
use clap::Parser;
use libxynae::error::ProviderResult;
use libxynae::platforms::x::XClient;
use libxynae::platforms::SocialClient;
use libxynae::{
    ActivityStore, Agent, Clock, Config, Language, Persona, PostCategory, ProviderManager,
    StoreStats, SystemClock,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "xyn-status")]
#[command(version, about = "Report provider, platform and store availability")]
#[command(long_about = r#"Report which LLM providers, social client and activity store are usable
with the current configuration and environment.

EXAMPLES:
    # Availability report
    xyn-status

    # Also generate one sample post (not published)
    xyn-status --test

EXIT CODES:
    0 - Report printed (and sample generated with --test)
    1 - --test requested but generation was not possible
"#)]
struct Cli {
    /// Generate a sample post with the current provider
    #[arg(long)]
    test: bool,

    /// Configuration file (default: $XYNAE_CONFIG or ~/.config/xynae/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Availability {
    Ready(String),
    Missing(String),
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Ready(detail) => write!(f, "✓ {}", detail),
            Availability::Missing(detail) => write!(f, "✗ {}", detail),
        }
    }
}

struct StatusReport {
    providers: Availability,
    social: Availability,
    store: Availability,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Xynae status")?;
        writeln!(f, "  LLM providers:  {}", self.providers)?;
        writeln!(f, "  X client:       {}", self.social)?;
        write!(f, "  Activity store: {}", self.store)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    libxynae::config::load_dotenv();
    libxynae::logging::init_cli(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let providers = ProviderManager::from_config(&config.llm);
    let report = StatusReport {
        providers: describe_providers(&providers),
        social: check_social(&config).await,
        store: check_store(&config).await,
    };
    println!("{}", report);

    if cli.test {
        let providers = providers.context("Cannot run a test generation")?;
        let sample = sample_post(providers, &config).await?;
        println!();
        println!("Sample post ({} chars):", sample.chars().count());
        println!("{}", sample);
    }

    Ok(())
}

fn describe_providers(providers: &ProviderResult<ProviderManager>) -> Availability {
    match providers {
        Ok(manager) => Availability::Ready(format!(
            "{} (current: {})",
            manager.names().join(", "),
            manager.current().unwrap_or("none")
        )),
        Err(e) => Availability::Missing(e.to_string()),
    }
}

async fn check_social(config: &Config) -> Availability {
    let client = match XClient::from_env(&config.x) {
        Ok(client) => client,
        Err(e) => return Availability::Missing(format!("not configured ({})", e)),
    };
    match client.get_self().await {
        Ok(identity) => Availability::Ready(format!("authenticated as @{}", identity.handle)),
        Err(e) => Availability::Missing(format!("authentication failed ({})", e)),
    }
}

async fn check_store(config: &Config) -> Availability {
    if !config.database.enabled {
        return Availability::Missing("disabled in configuration".to_string());
    }
    let mut store = ActivityStore::connect(&config.database).await;
    let availability = describe_store(&store.stats().await);
    store.close().await;
    availability
}

fn describe_store(stats: &StoreStats) -> Availability {
    if !stats.connected {
        return Availability::Missing("unavailable".to_string());
    }
    Availability::Ready(format!(
        "{} ({} posts, {} replies, {} mentions)",
        stats.database.as_deref().unwrap_or("connected"),
        stats.posts_count,
        stats.replies_count,
        stats.mentions_count
    ))
}

async fn sample_post(providers: ProviderManager, config: &Config) -> Result<String> {
    let persona = Persona::new(config.load_personality()?, config.agent.network_size);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut agent = Agent::new(
        providers,
        None,
        ActivityStore::disconnected(),
        persona,
        clock,
    );

    let (category, language) = {
        let mut rng = rand::thread_rng();
        (PostCategory::draw(&mut rng), Language::draw(&mut rng))
    };
    let text = agent
        .compose_post(category, language)
        .await
        .context("Test generation failed")?;
    Ok(text)
}
