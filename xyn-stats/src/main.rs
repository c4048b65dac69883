use anyhow::{Context, Result};
use clap::Parser;
use libxynae::{ActivityStore, Config, PostRecord, ReplyRecord, StoreStats};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xyn-stats")]
#[command(version, about = "Print activity store statistics")]
#[command(long_about = r#"Print counts from the activity store, optionally with the most recent
posts, and export everything as JSON.

EXAMPLES:
    # Counts and the last 5 posts (default)
    xyn-stats

    # More history
    xyn-stats --recent 20

    # Counts only
    xyn-stats --recent 0

    # Export for analysis
    xyn-stats --json activity.json
    xyn-stats --json - | jq '.stats.posted_posts'

EXIT CODES:
    0 - Success (including an empty store)
    1 - Error (store disabled or unreachable, export failed, etc.)
"#)]
struct Args {
    /// Number of recent posts and replies to show
    #[arg(short, long, default_value = "5", value_name = "N")]
    recent: usize,

    /// Write stats and recent activity as JSON ("-" for stdout)
    #[arg(long, value_name = "FILE")]
    json: Option<String>,

    /// Configuration file (default: $XYNAE_CONFIG or ~/.config/xynae/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Everything the JSON export contains
#[derive(Debug, Serialize)]
struct Export {
    stats: StoreStats,
    recent_posts: Vec<PostRecord>,
    recent_replies: Vec<ReplyRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    libxynae::config::load_dotenv();
    libxynae::logging::init_cli(args.verbose);

    let config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    let mut store = ActivityStore::connect(&config.database).await;
    store.require().with_context(|| {
        if config.database.enabled {
            format!("Activity store at {} is unreachable", config.database.path)
        } else {
            "Activity store is disabled in configuration".to_string()
        }
    })?;

    let export = Export {
        stats: store.stats().await,
        recent_posts: store.recent_posts(args.recent).await,
        recent_replies: store.recent_replies(args.recent).await,
    };
    store.close().await;

    match args.json.as_deref() {
        Some("-") => println!("{}", serde_json::to_string_pretty(&export)?),
        Some(path) => {
            print_text(&export, args.recent);
            let json = serde_json::to_string_pretty(&export)?;
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            println!();
            println!("Exported to {}", path);
        }
        None => print_text(&export, args.recent),
    }

    Ok(())
}

fn print_text(export: &Export, recent: usize) {
    for line in summary_lines(&export.stats) {
        println!("{}", line);
    }

    if recent == 0 {
        return;
    }

    println!();
    if export.recent_posts.is_empty() {
        println!("No posts yet.");
    } else {
        println!("Recent posts:");
        for post in &export.recent_posts {
            println!("  {}", post_line(post));
        }
    }

    if !export.recent_replies.is_empty() {
        println!();
        println!("Recent replies:");
        for reply in &export.recent_replies {
            println!(
                "  {} @{}: {}",
                format_timestamp(reply.created_at),
                reply.author_handle,
                preview(&reply.reply_text, 60)
            );
        }
    }
}

fn summary_lines(stats: &StoreStats) -> Vec<String> {
    vec![
        format!(
            "Store:               {}",
            stats.database.as_deref().unwrap_or("(unknown)")
        ),
        format!(
            "Posts generated:     {} ({} published)",
            stats.posts_count, stats.posted_posts
        ),
        format!("Replies:             {}", stats.replies_count),
        format!(
            "Mentions seen:       {} ({} replied)",
            stats.mentions_count, stats.replied_mentions
        ),
        format!("Conversation events: {}", stats.conversation_events),
    ]
}

fn post_line(post: &PostRecord) -> String {
    let symbol = if post.posted { "✓" } else { "✗" };
    format!(
        "{} {} [{}/{}] {}",
        symbol,
        format_timestamp(post.created_at),
        post.category,
        post.language,
        preview(&post.text, 60)
    )
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// First `max` characters, with an ellipsis when cut
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let head: String = flat.chars().take(max).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libxynae::{Language, PostCategory};

    #[test]
    fn test_preview_is_char_based() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("网络特别活跃", 2), "网络...");
        assert_eq!(preview("a\nb", 10), "a b");
    }

    #[test]
    fn test_post_line_marks_unposted() {
        let mut post = PostRecord::new(
            "hello".to_string(),
            PostCategory::Ecosystem,
            Language::Chinese,
            false,
            None,
        );
        post.created_at = 0;
        assert_eq!(
            post_line(&post),
            "✗ 1970-01-01 00:00:00 [ecosystem/chinese] hello"
        );
    }

    #[test]
    fn test_summary_lines() {
        let stats = StoreStats {
            connected: true,
            database: Some("activity.db".to_string()),
            posts_count: 10,
            posted_posts: 7,
            mentions_count: 4,
            replied_mentions: 3,
            ..StoreStats::default()
        };
        let lines = summary_lines(&stats);
        assert_eq!(lines[1], "Posts generated:     10 (7 published)");
        assert_eq!(lines[3], "Mentions seen:       4 (3 replied)");
    }
}
