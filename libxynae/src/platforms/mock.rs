//! Mock social client for testing
//!
//! Scriptable stand-in for a real platform: seed it with an identity,
//! mentions and users, inject publish failures, then inspect what the agent
//! tried to publish. Clones share state.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result, XynaeError};
use crate::platforms::{Identity, Mention, PublishedPost, SocialClient, UserProfile};

/// How `post_text` should fail
#[derive(Debug, Clone)]
pub enum PostFailure {
    /// An ordinary platform error
    Platform(String),
    /// A non-platform error, as if something unexpected broke mid-publish
    Unexpected(String),
}

#[derive(Debug, Default)]
struct MockState {
    identity: Option<Identity>,
    mentions: Vec<Mention>,
    users: HashMap<String, String>,
    post_failure: Option<PostFailure>,
    reply_failures: usize,
    posts: Vec<String>,
    replies: Vec<(String, String)>,
    get_self_calls: usize,
    mention_fetches: usize,
    post_attempts: usize,
    reply_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct MockSocialClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockSocialClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSocialClient {
    /// A client authenticated as `@xynae` (id `1000`)
    pub fn new() -> Self {
        let client = Self {
            state: Arc::new(Mutex::new(MockState::default())),
        };
        client.state.lock().unwrap().identity = Some(Identity {
            id: "1000".to_string(),
            handle: "xynae".to_string(),
        });
        client
    }

    /// A client whose identity lookup fails
    pub fn without_identity() -> Self {
        let client = Self::new();
        client.state.lock().unwrap().identity = None;
        client
    }

    /// Add a mention to the fetch results (newest first order is preserved)
    pub fn add_mention(&self, id: &str, text: &str, author_id: &str) {
        self.state.lock().unwrap().mentions.push(Mention {
            id: id.to_string(),
            text: text.to_string(),
            author_id: author_id.to_string(),
            created_at: None,
        });
    }

    pub fn clear_mentions(&self) {
        self.state.lock().unwrap().mentions.clear();
    }

    /// Make `user_id` resolvable to `handle`
    pub fn add_user(&self, user_id: &str, handle: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user_id.to_string(), handle.to_string());
    }

    /// Fail every `post_text` until cleared
    pub fn fail_posts(&self, failure: PostFailure) {
        self.state.lock().unwrap().post_failure = Some(failure);
    }

    pub fn clear_post_failure(&self) {
        self.state.lock().unwrap().post_failure = None;
    }

    /// Fail the next `count` calls to `post_reply`
    pub fn fail_next_replies(&self, count: usize) {
        self.state.lock().unwrap().reply_failures = count;
    }

    /// Texts successfully posted
    pub fn posts(&self) -> Vec<String> {
        self.state.lock().unwrap().posts.clone()
    }

    /// `(parent_id, text)` for each successful reply
    pub fn replies(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().replies.clone()
    }

    pub fn get_self_calls(&self) -> usize {
        self.state.lock().unwrap().get_self_calls
    }

    pub fn mention_fetches(&self) -> usize {
        self.state.lock().unwrap().mention_fetches
    }

    pub fn post_attempts(&self) -> usize {
        self.state.lock().unwrap().post_attempts
    }

    pub fn reply_attempts(&self) -> usize {
        self.state.lock().unwrap().reply_attempts
    }
}

fn published() -> PublishedPost {
    PublishedPost {
        id: uuid::Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl SocialClient for MockSocialClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_self(&self) -> Result<Identity> {
        let mut state = self.state.lock().unwrap();
        state.get_self_calls += 1;
        state
            .identity
            .clone()
            .ok_or_else(|| {
                PlatformError::Authentication("Mock identity unavailable".to_string()).into()
            })
    }

    async fn get_mentions(&self, _user_id: &str, max: usize) -> Result<Vec<Mention>> {
        let mut state = self.state.lock().unwrap();
        state.mention_fetches += 1;
        Ok(state.mentions.iter().take(max).cloned().collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        let state = self.state.lock().unwrap();
        state
            .users
            .get(user_id)
            .map(|handle| UserProfile {
                id: user_id.to_string(),
                handle: handle.clone(),
            })
            .ok_or_else(|| PlatformError::Response(format!("Unknown user {}", user_id)).into())
    }

    async fn post_text(&self, text: &str) -> Result<PublishedPost> {
        let mut state = self.state.lock().unwrap();
        state.post_attempts += 1;

        match &state.post_failure {
            Some(PostFailure::Platform(message)) => {
                Err(PlatformError::Posting(message.clone()).into())
            }
            Some(PostFailure::Unexpected(message)) => {
                Err(XynaeError::InvalidInput(message.clone()))
            }
            None => {
                state.posts.push(text.to_string());
                Ok(published())
            }
        }
    }

    async fn post_reply(&self, text: &str, parent_id: &str) -> Result<PublishedPost> {
        let mut state = self.state.lock().unwrap();
        state.reply_attempts += 1;

        if state.reply_failures > 0 {
            state.reply_failures -= 1;
            let detail = format!("Mock reply to {} failed", parent_id);
            return Err(PlatformError::Posting(detail).into());
        }

        state.replies.push((parent_id.to_string(), text.to_string()));
        Ok(published())
    }
}
