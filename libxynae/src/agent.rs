//! The posting and reply agent
//!
//! An [`Agent`] owns everything one running instance needs: its providers,
//! an optional social client, the activity store, the reply tracker, and
//! its own persona. Two agents in one process share nothing.

use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::content::{
    self, Language, Persona, PostCategory, ReplyLanguage, POST_MAX_TOKENS, REPLY_MAX_TOKENS,
};
use crate::dedup::{ReplyTracker, RECENT_REPLY_CAPACITY};
use crate::error::{ProviderError, Result};
use crate::platforms::{self, SocialClient};
use crate::providers::{GenerationRequest, ProviderManager};
use crate::store::ActivityStore;
use crate::types::{MentionRecord, PostRecord, ReplyRecord};

/// Generated posts remembered for prompt context
pub const HISTORY_LIMIT: usize = 5;

/// Pause after each published reply within one check
pub const REPLY_PAUSE: Duration = Duration::from_secs(5);

/// Mentions fetched per check
pub const MENTION_BATCH: usize = 10;

/// Handle used when the author lookup fails
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// What one mention check did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub fetched: usize,
    /// Already replied to
    pub skipped: usize,
    pub replied: usize,
    /// Reply generation or publish failed; retried next check
    pub failed: usize,
}

pub struct Agent {
    providers: ProviderManager,
    social: Option<Box<dyn SocialClient>>,
    store: ActivityStore,
    tracker: ReplyTracker,
    persona: Persona,
    history: VecDeque<String>,
    clock: Arc<dyn Clock>,
    max_mentions: usize,
    provider_hint: Option<String>,
}

impl Agent {
    /// Assemble an agent from its parts
    ///
    /// The dedup source is fixed here: the store's `replied` flag if the
    /// store is connected, otherwise an in-memory window.
    pub fn new(
        providers: ProviderManager,
        social: Option<Box<dyn SocialClient>>,
        store: ActivityStore,
        persona: Persona,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = ReplyTracker::for_store(&store);
        if tracker.is_persistent() {
            debug!("Reply dedup backed by the activity store");
        } else {
            info!(
                "Reply dedup running in memory (last {} mentions)",
                RECENT_REPLY_CAPACITY
            );
        }

        Self {
            providers,
            social,
            store,
            tracker,
            persona,
            history: VecDeque::with_capacity(HISTORY_LIMIT + 1),
            clock,
            max_mentions: MENTION_BATCH,
            provider_hint: None,
        }
    }

    /// Build an agent from configuration and the environment
    ///
    /// Fails only when no LLM provider is usable or the configured
    /// personality file cannot be read. A missing store or social client
    /// leaves the agent running in reduced-capability mode.
    pub async fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let providers = ProviderManager::from_config(&config.llm)?;
        let persona = Persona::new(config.load_personality()?, config.agent.network_size);
        let store = ActivityStore::connect(&config.database).await;
        let social = platforms::connect(&config.x).await;

        Ok(Self::new(providers, social, store, persona, clock)
            .with_max_mentions(config.x.max_mentions))
    }

    pub fn with_max_mentions(mut self, max_mentions: usize) -> Self {
        self.max_mentions = max_mentions;
        self
    }

    /// Route every generation to `provider` first
    pub fn with_provider_hint(mut self, provider: Option<String>) -> Self {
        self.provider_hint = provider;
        self
    }

    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    pub fn store(&self) -> &ActivityStore {
        &self.store
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn has_social_client(&self) -> bool {
        self.social.is_some()
    }

    /// Whether replies are deduplicated through the store
    pub fn persistent_dedup(&self) -> bool {
        self.tracker.is_persistent()
    }

    /// History entries, oldest first
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Generate post text for the given category and language
    ///
    /// Falls back to static text when every provider fails. The result never
    /// exceeds the platform limit.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotAvailable` if a provider hint is set and
    /// names an unregistered provider.
    pub async fn compose_post(
        &mut self,
        category: PostCategory,
        language: Language,
    ) -> Result<String> {
        let request = {
            let mut rng = rand::thread_rng();
            let recent: Vec<String> = self.history.iter().cloned().collect();
            let context = content::post_context(&self.persona, &local_time(), &recent, &mut rng);
            let prompt = content::post_prompt(&self.persona, &context, category, language);
            GenerationRequest::sampled(prompt, POST_MAX_TOKENS, &mut rng)
        };

        let generated = match self.generate(&request).await? {
            Some(text) => text,
            None => {
                let text = content::fallback_post(category, language, &mut rand::thread_rng());
                return Ok(content::truncate_post(&text));
            }
        };

        let text = content::truncate_post(&generated);
        let entry = content::history_entry(category, &text);
        self.history.push_back(entry.clone());
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }

        self.store
            .save_conversation_event(
                "post_generation",
                &entry,
                json!({ "category": category.as_str(), "language": language.as_str() }),
            )
            .await;

        Ok(text)
    }

    /// Generate a reply to `mention_text` from `author_handle`
    ///
    /// The reply language is a fresh coin flip on every call.
    pub async fn compose_reply(&self, mention_text: &str, author_handle: &str) -> Result<String> {
        let (language, request) = {
            let mut rng = rand::thread_rng();
            let language = ReplyLanguage::flip(&mut rng);
            let prompt =
                content::reply_prompt(&self.persona, author_handle, mention_text, language);
            (language, GenerationRequest::sampled(prompt, REPLY_MAX_TOKENS, &mut rng))
        };

        let text = match self.generate(&request).await? {
            Some(text) => text,
            None => language.fallback_reply().to_string(),
        };
        Ok(content::truncate_post(&text))
    }

    /// `Ok(None)` when the fallback chain is exhausted
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        match self
            .providers
            .generate_with(request, self.provider_hint.as_deref())
            .await
        {
            Ok(generated) => {
                debug!(
                    "Generated {} chars with {}",
                    generated.text.chars().count(),
                    generated.provider
                );
                Ok(Some(generated.text))
            }
            Err(e @ ProviderError::AllProvidersFailed { .. }) => {
                warn!("{}; using fallback text", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Draw a category and language, then generate, publish and record one post
    ///
    /// Exactly one record is saved per call. A platform failure is recorded
    /// as an unposted record; without a social client the post is recorded
    /// unposted as well.
    ///
    /// # Errors
    ///
    /// Any non-platform failure while generating or publishing. Nothing is
    /// recorded in that case.
    pub async fn post_scheduled(&mut self) -> Result<PostRecord> {
        let (category, language) = {
            let mut rng = rand::thread_rng();
            (PostCategory::draw(&mut rng), Language::draw(&mut rng))
        };
        info!("Composing {} post ({})", category, language);

        let text = self.compose_post(category, language).await?;

        let (posted, external_id) = match &self.social {
            Some(social) => match social.post_text(&text).await {
                Ok(published) => {
                    info!(
                        "Posted {} to {} ({}/{} chars)",
                        published.id,
                        social.name(),
                        text.chars().count(),
                        content::MAX_POST_CHARS
                    );
                    (true, Some(published.id))
                }
                Err(e) if e.is_platform() => {
                    warn!("Failed to publish post: {}", e);
                    (false, None)
                }
                Err(e) => return Err(e),
            },
            None => {
                info!("No social client configured, recording post without publishing");
                (false, None)
            }
        };

        let mut record = PostRecord::new(text, category, language, posted, external_id);
        record.id = self.store.save_post(&record).await;

        let mut rng = rand::thread_rng();
        self.persona.maybe_grow(&mut rng);

        Ok(record)
    }

    /// Fetch recent mentions and reply to each one not yet replied to
    ///
    /// Never fails: every problem is logged and counted. A mention whose
    /// reply could not be published stays unreplied and is retried on the
    /// next check.
    pub async fn check_and_reply(&mut self) -> CheckSummary {
        let mut summary = CheckSummary::default();

        let Some(social) = self.social.as_ref() else {
            debug!("No social client configured, skipping mention check");
            return summary;
        };

        let identity = match social.get_self().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Could not resolve own identity, skipping mention check: {}", e);
                return summary;
            }
        };

        let mentions = match social.get_mentions(&identity.id, self.max_mentions).await {
            Ok(mentions) => mentions,
            Err(e) => {
                warn!("Failed to fetch mentions: {}", e);
                return summary;
            }
        };
        summary.fetched = mentions.len();
        if mentions.is_empty() {
            info!("No new mentions");
            return summary;
        }

        for mention in mentions {
            if self.tracker.already_replied(&mention.id).await {
                summary.skipped += 1;
                continue;
            }

            let handle = match social.get_user(&mention.author_id).await {
                Ok(user) => user.handle,
                Err(e) => {
                    debug!("Author lookup for {} failed: {}", mention.author_id, e);
                    UNKNOWN_AUTHOR.to_string()
                }
            };

            self.tracker
                .observe(&MentionRecord::observed(
                    mention.id.clone(),
                    mention.text.clone(),
                    handle.clone(),
                    mention.author_id.clone(),
                ))
                .await;

            let reply_text = match self.compose_reply(&mention.text, &handle).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Could not compose reply to {}: {}", mention.id, e);
                    summary.failed += 1;
                    continue;
                }
            };

            match social.post_reply(&reply_text, &mention.id).await {
                Ok(published) => {
                    info!("Replied to @{} (mention {})", handle, mention.id);
                    let reply = ReplyRecord::new(
                        mention.id,
                        mention.text,
                        handle,
                        reply_text,
                        Some(published.id),
                    );
                    self.tracker.mark_replied(&reply).await;
                    summary.replied += 1;

                    self.clock.sleep(REPLY_PAUSE).await;
                }
                Err(e) => {
                    warn!("Failed to reply to @{} (mention {}): {}", handle, mention.id, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Log final store stats and release the store
    pub async fn shutdown(mut self) {
        if self.store.is_connected() {
            let stats = self.store.stats().await;
            info!(
                "Store stats: {} posts ({} published), {} replies, {} mentions",
                stats.posts_count, stats.posted_posts, stats.replies_count, stats.mentions_count
            );
        }
        self.store.close().await;
        info!("Agent stopped");
    }
}

fn local_time() -> String {
    chrono::Local::now().format("%I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ProviderResult;
    use crate::platforms::mock::{MockSocialClient, PostFailure};
    use crate::providers::mock::MockProvider;
    use crate::providers::{Provider, ProviderPreference};

    fn manager(providers: &[&MockProvider]) -> ProviderManager {
        let candidates: Vec<ProviderResult<Box<dyn Provider>>> = providers
            .iter()
            .map(|p| Ok(Box::new((*p).clone()) as Box<dyn Provider>))
            .collect();
        ProviderManager::from_candidates(candidates, ProviderPreference::Auto).unwrap()
    }

    fn agent(
        provider: &MockProvider,
        social: Option<&MockSocialClient>,
        clock: &ManualClock,
    ) -> Agent {
        Agent::new(
            manager(&[provider]),
            social.map(|s| Box::new(s.clone()) as Box<dyn SocialClient>),
            ActivityStore::disconnected(),
            Persona::new(Some("You are a test agent.".to_string()), Some(10_000)),
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn test_compose_post_truncates_and_records_history() {
        let provider = MockProvider::succeeding("mock", &"a".repeat(400));
        let mut agent = agent(&provider, None, &ManualClock::new());

        let text = agent
            .compose_post(PostCategory::Insight, Language::English)
            .await
            .unwrap();

        assert_eq!(text.chars().count(), content::MAX_POST_CHARS);
        assert!(text.ends_with("..."));
        let history: Vec<&str> = agent.history().collect();
        assert_eq!(history.len(), 1);
        assert!(history[0].starts_with("insight: aaaa"));
    }

    #[tokio::test]
    async fn test_compose_post_prompt_carries_persona_and_history() {
        let provider = MockProvider::succeeding("mock", "first post");
        let mut agent = agent(&provider, None, &ManualClock::new());

        agent
            .compose_post(PostCategory::Ecosystem, Language::Chinese)
            .await
            .unwrap();
        agent
            .compose_post(PostCategory::Autonomy, Language::Mixed)
            .await
            .unwrap();

        let prompts = provider.prompts();
        assert!(prompts[0].starts_with("You are a test agent."));
        assert!(prompts[0].contains("~10,000"));
        assert!(!prompts[0].contains("Recent activity"));
        assert!(prompts[1].contains("Recent activity: ecosystem: first post..."));
        assert_eq!(provider.requests()[0].max_tokens, POST_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let provider = MockProvider::succeeding("mock", "post");
        let mut agent = agent(&provider, None, &ManualClock::new());

        for _ in 0..8 {
            agent
                .compose_post(PostCategory::Invitation, Language::English)
                .await
                .unwrap();
        }
        assert_eq!(agent.history().count(), HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_compose_post_uses_fallback_when_all_fail() {
        let provider = MockProvider::failing("mock", "down");
        let mut agent = agent(&provider, None, &ManualClock::new());

        let text = agent
            .compose_post(PostCategory::Autonomy, Language::English)
            .await
            .unwrap();
        assert!(text.starts_with("True autonomy"));
        assert_eq!(agent.history().count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider_hint_is_an_error() {
        let provider = MockProvider::succeeding("mock", "x");
        let mut agent = agent(&provider, None, &ManualClock::new())
            .with_provider_hint(Some("gemini".to_string()));

        let err = agent
            .compose_post(PostCategory::Insight, Language::English)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::XynaeError::Provider(ProviderError::NotAvailable { .. })
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_compose_reply() {
        let provider = MockProvider::succeeding("mock", " Welcome aboard. ");
        let agent = agent(&provider, None, &ManualClock::new());

        let reply = agent.compose_reply("@xynae hello!", "alice").await.unwrap();
        assert_eq!(reply, "Welcome aboard.");

        let request = &provider.requests()[0];
        assert_eq!(request.max_tokens, REPLY_MAX_TOKENS);
        assert!(request.prompt.contains("@alice"));
        assert!(request.prompt.contains("@xynae hello!"));
    }

    #[tokio::test]
    async fn test_post_without_social_client_is_recorded_unposted() {
        let provider = MockProvider::succeeding("mock", "hello network");
        let mut agent = agent(&provider, None, &ManualClock::new());

        let record = agent.post_scheduled().await.unwrap();
        assert!(!record.posted);
        assert_eq!(record.external_id, None);
        assert_eq!(record.text, "hello network");
        assert_eq!(record.id, None);
    }

    #[tokio::test]
    async fn test_post_platform_failure_is_recorded() {
        let provider = MockProvider::succeeding("mock", "hello network");
        let social = MockSocialClient::new();
        social.fail_posts(PostFailure::Platform("503".to_string()));
        let mut agent = agent(&provider, Some(&social), &ManualClock::new());

        let record = agent.post_scheduled().await.unwrap();
        assert!(!record.posted);
        assert_eq!(social.post_attempts(), 1);
    }

    #[tokio::test]
    async fn test_post_unexpected_failure_propagates() {
        let provider = MockProvider::succeeding("mock", "hello network");
        let social = MockSocialClient::new();
        social.fail_posts(PostFailure::Unexpected("boom".to_string()));
        let mut agent = agent(&provider, Some(&social), &ManualClock::new());

        assert!(agent.post_scheduled().await.is_err());
    }

    #[tokio::test]
    async fn test_post_published() {
        let provider = MockProvider::succeeding("mock", "hello network");
        let social = MockSocialClient::new();
        let mut agent = agent(&provider, Some(&social), &ManualClock::new());

        let record = agent.post_scheduled().await.unwrap();
        assert!(record.posted);
        assert!(record.external_id.is_some());
        assert_eq!(social.posts(), vec!["hello network"]);
    }

    #[tokio::test]
    async fn test_check_without_identity_is_noop() {
        let provider = MockProvider::succeeding("mock", "reply");
        let social = MockSocialClient::without_identity();
        social.add_mention("1", "hi", "7");
        let mut agent = agent(&provider, Some(&social), &ManualClock::new());

        let summary = agent.check_and_reply().await;
        assert_eq!(summary, CheckSummary::default());
        assert_eq!(social.mention_fetches(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_check_replies_and_pauses() {
        let provider = MockProvider::succeeding("mock", "reply");
        let social = MockSocialClient::new();
        social.add_mention("1", "hi", "7");
        social.add_mention("2", "yo", "8");
        social.add_user("7", "alice");
        let clock = ManualClock::new();
        let mut agent = agent(&provider, Some(&social), &clock);

        let summary = agent.check_and_reply().await;
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.replied, 2);
        assert_eq!(clock.sleeps(), vec![REPLY_PAUSE, REPLY_PAUSE]);

        // Unresolvable author falls back to the sentinel handle
        let prompts = provider.prompts();
        assert!(prompts[0].contains("@alice"));
        assert!(prompts[1].contains("@unknown"));

        let summary = agent.check_and_reply().await;
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.replied, 0);
        assert_eq!(social.replies().len(), 2);
    }

    #[tokio::test]
    async fn test_check_respects_batch_size() {
        let provider = MockProvider::succeeding("mock", "reply");
        let social = MockSocialClient::new();
        for i in 0..25 {
            social.add_mention(&i.to_string(), "hi", "7");
        }
        let mut agent = agent(&provider, Some(&social), &ManualClock::new());

        let summary = agent.check_and_reply().await;
        assert_eq!(summary.fetched, MENTION_BATCH);
    }
}
