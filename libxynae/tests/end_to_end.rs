//! End-to-end tests for the agent loop
//!
//! Drives real `Agent`/`Scheduler` instances against mock providers, a mock
//! social client, a virtual clock, and throwaway SQLite stores.

use std::sync::Arc;
use std::time::Duration;

use libxynae::clock::{Clock, ManualClock};
use libxynae::config::{Config, DatabaseConfig};
use libxynae::dedup::{RecentIds, RECENT_REPLY_CAPACITY};
use libxynae::error::{ProviderError, ProviderResult, XynaeError};
use libxynae::platforms::mock::{MockSocialClient, PostFailure};
use libxynae::platforms::SocialClient;
use libxynae::providers::mock::MockProvider;
use libxynae::providers::{GenerationRequest, Provider, ProviderManager, ProviderPreference};
use libxynae::{ActivityStore, Agent, Database, Persona, Scheduler};
use serial_test::serial;
use tempfile::TempDir;

fn manager(providers: &[&MockProvider]) -> ProviderManager {
    let candidates: Vec<ProviderResult<Box<dyn Provider>>> = providers
        .iter()
        .map(|p| Ok(Box::new((*p).clone()) as Box<dyn Provider>))
        .collect();
    ProviderManager::from_candidates(candidates, ProviderPreference::Auto).unwrap()
}

fn build_agent(
    provider: &MockProvider,
    social: Option<&MockSocialClient>,
    store: ActivityStore,
    clock: &ManualClock,
) -> Agent {
    Agent::new(
        manager(&[provider]),
        social.map(|s| Box::new(s.clone()) as Box<dyn SocialClient>),
        store,
        Persona::new(None, Some(10_000)),
        Arc::new(clock.clone()),
    )
}

async fn connected_store() -> (TempDir, ActivityStore, Database) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("activity.db");
    let db = Database::new(&path.to_string_lossy()).await.unwrap();
    (temp_dir, ActivityStore::from_database(db.clone()), db)
}

#[tokio::test]
async fn test_store_backed_dedup_never_replies_twice() {
    let (_temp, store, db) = connected_store().await;
    let provider = MockProvider::succeeding("mock", "Welcome!");
    let social = MockSocialClient::new();
    social.add_mention("500", "@xynae hello", "7");
    social.add_user("7", "alice");
    let clock = ManualClock::new();
    let mut agent = build_agent(&provider, Some(&social), store, &clock);
    assert!(agent.persistent_dedup());

    let first = agent.check_and_reply().await;
    let second = agent.check_and_reply().await;

    assert_eq!(first.replied, 1);
    assert_eq!(second.replied, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(social.replies().len(), 1);

    let mention = db.get_mention("500").await.unwrap().unwrap();
    assert!(mention.replied);
    assert_eq!(mention.author_handle, "alice");
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.replies_count, 1);
    assert_eq!(stats.mentions_count, 1);
}

#[tokio::test]
async fn test_store_dedup_survives_agent_restart() {
    let (_temp, store, db) = connected_store().await;
    let provider = MockProvider::succeeding("mock", "Welcome!");
    let social = MockSocialClient::new();
    social.add_mention("42", "@xynae hi", "7");
    let clock = ManualClock::new();

    let mut agent = build_agent(&provider, Some(&social), store, &clock);
    agent.check_and_reply().await;

    // A fresh agent over the same database sees the replied flag
    let mut restarted =
        build_agent(&provider, Some(&social), ActivityStore::from_database(db), &clock);
    let summary = restarted.check_and_reply().await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(social.reply_attempts(), 1);
}

#[test]
fn test_memory_dedup_retains_only_latest_hundred() {
    let mut recent = RecentIds::new(RECENT_REPLY_CAPACITY);
    for id in 0..350u32 {
        recent.insert(&id.to_string());
    }

    assert_eq!(recent.len(), RECENT_REPLY_CAPACITY);
    for id in 0..250u32 {
        assert!(!recent.contains(&id.to_string()));
    }
    for id in 250..350u32 {
        assert!(recent.contains(&id.to_string()));
    }
}

#[tokio::test]
async fn test_memory_dedup_evicts_oldest_mentions() {
    let provider = MockProvider::succeeding("mock", "hi");
    let social = MockSocialClient::new();
    let clock = ManualClock::new();
    let mut agent = build_agent(
        &provider,
        Some(&social),
        ActivityStore::disconnected(),
        &clock,
    )
    .with_max_mentions(200);
    assert!(!agent.persistent_dedup());

    for id in 0..101 {
        social.add_mention(&id.to_string(), "hi", "7");
    }
    let summary = agent.check_and_reply().await;
    assert_eq!(summary.replied, 101);

    // "0" was evicted, so it is answered again; "50" is still known
    social.clear_mentions();
    social.add_mention("0", "hi", "7");
    social.add_mention("50", "hi", "7");
    let summary = agent.check_and_reply().await;
    assert_eq!(summary.replied, 1);
    assert_eq!(summary.skipped, 1);
    let replies = social.replies();
    assert_eq!(replies.last().map(|(id, _)| id.as_str()), Some("0"));
}

#[tokio::test]
async fn test_fallback_makes_exactly_k_plus_one_calls() {
    let providers = [
        MockProvider::failing("p1", "down"),
        MockProvider::failing("p2", "down"),
        MockProvider::failing("p3", "down"),
        MockProvider::succeeding("p4", "from p4"),
        MockProvider::succeeding("p5", "from p5"),
    ];
    let refs: Vec<&MockProvider> = providers.iter().collect();
    let manager = manager(&refs);

    let generated = manager
        .generate(&GenerationRequest::new("prompt", 150, 0.9))
        .await
        .unwrap();

    assert_eq!(generated.text, "from p4");
    let total: usize = providers.iter().map(|p| p.call_count()).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
#[serial]
async fn test_no_provider_fails_before_any_iteration() {
    for key in [
        "ANTHROPIC_API_KEY",
        "OPENAI_API_KEY",
        "GOOGLE_API_KEY",
        "GEMINI_API_KEY",
    ] {
        std::env::remove_var(key);
    }

    let mut config = Config::default();
    config.database = DatabaseConfig {
        enabled: false,
        path: String::new(),
    };

    let clock = ManualClock::new();
    let result = Agent::from_config(&config, Arc::new(clock.clone())).await;

    match result {
        Err(XynaeError::Provider(ProviderError::NoProviderConfigured)) => {}
        Err(e) => panic!("Expected NoProviderConfigured, got {}", e),
        Ok(_) => panic!("Expected NoProviderConfigured, got an agent"),
    }
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_zero_intervals_without_social_client() {
    let provider = MockProvider::succeeding("mock", "tick");
    let clock = ManualClock::new();
    let agent = build_agent(&provider, None, ActivityStore::disconnected(), &clock);
    let clock_handle: Arc<dyn Clock> = Arc::new(clock.clone());
    let mut scheduler = Scheduler::new(agent, clock_handle, Duration::ZERO, Duration::ZERO);

    for iteration in 1..=3 {
        let pause = scheduler.tick().await.unwrap();
        assert_eq!(pause, Duration::ZERO);
        assert_eq!(provider.call_count(), iteration);
    }
    assert!(!scheduler.agent().has_social_client());
}

#[tokio::test]
async fn test_failed_reply_is_retried_next_cycle() {
    let (_temp, store, db) = connected_store().await;
    let provider = MockProvider::succeeding("mock", "Hello!");
    let social = MockSocialClient::new();
    social.add_mention("123", "@xynae are you there?", "7");
    social.fail_next_replies(1);
    let clock = ManualClock::new();
    let mut agent = build_agent(&provider, Some(&social), store, &clock);

    let first = agent.check_and_reply().await;
    assert_eq!(first.failed, 1);
    assert!(!db.is_mention_replied("123").await.unwrap());
    // Observed before replying, so it is on record as unreplied
    assert!(db.get_mention("123").await.unwrap().is_some());

    let second = agent.check_and_reply().await;
    assert_eq!(second.replied, 1);
    assert_eq!(social.reply_attempts(), 2);
    assert!(db.is_mention_replied("123").await.unwrap());
}

#[tokio::test]
async fn test_failed_reply_is_retried_in_memory_mode() {
    let provider = MockProvider::succeeding("mock", "Hello!");
    let social = MockSocialClient::new();
    social.add_mention("123", "@xynae ping", "7");
    social.fail_next_replies(1);
    let clock = ManualClock::new();
    let mut agent = build_agent(
        &provider,
        Some(&social),
        ActivityStore::disconnected(),
        &clock,
    );

    assert_eq!(agent.check_and_reply().await.failed, 1);
    assert_eq!(agent.check_and_reply().await.replied, 1);
    assert_eq!(agent.check_and_reply().await.skipped, 1);
    assert_eq!(social.reply_attempts(), 2);
}

#[tokio::test]
async fn test_store_unavailable_degrades_to_memory() {
    let store = ActivityStore::connect(&DatabaseConfig {
        enabled: true,
        path: "/tmp/xynae\0unreachable.db".to_string(),
    })
    .await;
    assert!(!store.is_connected());

    let provider = MockProvider::succeeding("mock", "Hello!");
    let social = MockSocialClient::new();
    social.add_mention("9", "@xynae hey", "7");
    let clock = ManualClock::new();
    let mut agent = build_agent(&provider, Some(&social), store, &clock);

    let record = agent.post_scheduled().await.unwrap();
    assert!(record.posted);
    assert_eq!(record.id, None);

    let summary = agent.check_and_reply().await;
    assert_eq!(summary.replied, 1);
    assert_eq!(agent.check_and_reply().await.skipped, 1);
    assert_eq!(agent.store().stats().await, libxynae::StoreStats::default());
}

#[tokio::test]
async fn test_one_record_per_post_attempt() {
    let (_temp, store, db) = connected_store().await;
    let provider = MockProvider::succeeding("mock", "hello network");
    let social = MockSocialClient::new();
    let clock = ManualClock::new();
    let mut agent = build_agent(&provider, Some(&social), store, &clock);

    social.fail_posts(PostFailure::Platform("HTTP 503".to_string()));
    let failed = agent.post_scheduled().await.unwrap();
    social.clear_post_failure();
    let posted = agent.post_scheduled().await.unwrap();

    assert!(!failed.posted);
    assert!(posted.posted);

    let posts = db.recent_posts(10).await.unwrap();
    assert_eq!(posts.len(), 2);
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.posts_count, 2);
    assert_eq!(stats.posted_posts, 1);
    // One generation event per composed post
    assert_eq!(stats.conversation_events, 2);
}

#[tokio::test]
async fn test_backoff_after_unexpected_error() {
    let provider = MockProvider::succeeding("mock", "hello");
    let social = MockSocialClient::new();
    social.fail_posts(PostFailure::Unexpected("corrupted state".to_string()));
    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let clock = ManualClock::new().stop_at(Duration::from_secs(300), shutdown.clone());
    let agent = build_agent(&provider, Some(&social), ActivityStore::disconnected(), &clock);
    let clock_handle: Arc<dyn Clock> = Arc::new(clock.clone());

    Scheduler::new(
        agent,
        clock_handle,
        Duration::from_secs(1200),
        Duration::from_secs(300),
    )
    .with_shutdown(shutdown)
    .run()
    .await;

    // Exactly one attempt, then a full 300s backoff before shutdown
    assert_eq!(social.post_attempts(), 1);
    assert_eq!(clock.total_slept(), Duration::from_secs(300));
}

#[tokio::test]
async fn test_independent_agents_do_not_share_persona() {
    let provider = MockProvider::succeeding("mock", "x");
    let clock = ManualClock::new();
    let a = Agent::new(
        manager(&[&provider]),
        None,
        ActivityStore::disconnected(),
        Persona::new(Some("You are A.".to_string()), Some(1)),
        Arc::new(clock.clone()),
    );
    let b = Agent::new(
        manager(&[&provider]),
        None,
        ActivityStore::disconnected(),
        Persona::new(Some("You are B.".to_string()), Some(2)),
        Arc::new(clock.clone()),
    );

    a.compose_reply("hi", "carol").await.unwrap();
    b.compose_reply("hi", "carol").await.unwrap();

    let prompts = provider.prompts();
    assert!(prompts[0].starts_with("You are A."));
    assert!(prompts[1].starts_with("You are B."));
}
