//! xyn-generate - Generate posts without publishing them

use clap::Parser;
use libxynae::config::read_personality_file;
use libxynae::{
    ActivityStore, Agent, Clock, Config, Language, Persona, PostCategory, ProviderManager,
    Result, SystemClock, XynaeError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "xyn-generate")]
#[command(version, about = "Generate posts without publishing them")]
#[command(long_about = r#"Generate posts with the configured LLM providers and print them.

Nothing is published and nothing is recorded. When every provider fails the
static fallback text for the chosen category and language is printed instead.

EXAMPLES:
    # One post, random category and language
    xyn-generate

    # Three English invitation posts
    xyn-generate --category invitation --language english --count 3

    # Use a custom personality and a specific provider
    xyn-generate --personality-file persona.txt --provider anthropic

    # JSON for scripting
    xyn-generate --count 5 --format json | jq -r '.[].text'

CATEGORIES:
    insight, ecosystem, autonomy, invitation (or auto)

LANGUAGES:
    english, chinese, mixed (or auto)

EXIT CODES:
    0 - Success
    1 - Runtime error
    2 - Configuration error or no LLM provider
    3 - Invalid input
"#)]
struct Cli {
    /// Post category, or "auto" for a weighted random draw per post
    #[arg(long, default_value = "auto", value_name = "CATEGORY")]
    category: String,

    /// Post language, or "auto" for a weighted random draw per post
    #[arg(long, default_value = "auto", value_name = "LANGUAGE")]
    language: String,

    /// Number of posts to generate
    #[arg(short = 'n', long, default_value = "1", value_name = "N")]
    count: usize,

    /// Also write the output to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// File containing a custom personality prompt
    #[arg(long, value_name = "FILE")]
    personality_file: Option<String>,

    /// Start every generation with this provider
    #[arg(short, long)]
    provider: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Configuration file (default: $XYNAE_CONFIG or ~/.config/xynae/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct GeneratedPost {
    category: PostCategory,
    language: Language,
    text: String,
    length: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv = libxynae::config::load_dotenv();
    libxynae::logging::init_cli(cli.verbose);
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let category: Option<PostCategory> = parse_choice(&cli.category)?;
    let language: Option<Language> = parse_choice(&cli.language)?;
    if cli.count == 0 {
        return Err(XynaeError::InvalidInput(
            "--count must be at least 1".to_string(),
        ));
    }

    let config = Config::load_or_default(cli.config.as_deref())?;

    let personality = match &cli.personality_file {
        Some(path) => Some(read_personality_file(path)?),
        None => config.load_personality()?,
    };
    let persona = Persona::new(personality, config.agent.network_size);

    let providers = ProviderManager::from_config(&config.llm)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut agent = Agent::new(
        providers,
        None,
        ActivityStore::disconnected(),
        persona,
        clock,
    )
    .with_provider_hint(cli.provider.clone());

    let mut posts = Vec::with_capacity(cli.count);
    for i in 0..cli.count {
        let (category, language) = {
            let mut rng = rand::thread_rng();
            (
                category.unwrap_or_else(|| PostCategory::draw(&mut rng)),
                language.unwrap_or_else(|| Language::draw(&mut rng)),
            )
        };
        debug!("Generating post {}/{} ({}, {})", i + 1, cli.count, category, language);

        let text = agent.compose_post(category, language).await?;
        posts.push(GeneratedPost {
            category,
            language,
            length: text.chars().count(),
            text,
        });
    }

    let rendered = render(&posts, &cli.format)?;
    println!("{}", rendered);

    if let Some(path) = &cli.output {
        std::fs::write(path, format!("{}\n", rendered)).map_err(|e| {
            XynaeError::InvalidInput(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!("Wrote {} post(s) to {}", posts.len(), path.display());
    }

    Ok(())
}

/// `auto` (or empty) means draw at random
fn parse_choice<T>(value: &str) -> Result<Option<T>>
where
    T: FromStr<Err = XynaeError>,
{
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    value.parse().map(Some)
}

fn render(posts: &[GeneratedPost], format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(posts)
            .map_err(|e| XynaeError::InvalidInput(format!("Failed to serialize posts: {}", e))),
        _ => Ok(posts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}
