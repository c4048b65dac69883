//! Core types for Xynae

use serde::{Deserialize, Serialize};

use crate::content::{Language, PostCategory};

/// A generated post and the outcome of publishing it
///
/// One record per generation attempt, written once with its final state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostRecord {
    pub id: Option<i64>,
    pub text: String,
    pub category: PostCategory,
    pub language: Language,
    pub posted: bool,
    pub external_id: Option<String>,
    pub created_at: i64,
    pub length: usize,
}

impl PostRecord {
    pub fn new(
        text: String,
        category: PostCategory,
        language: Language,
        posted: bool,
        external_id: Option<String>,
    ) -> Self {
        let length = text.chars().count();
        Self {
            id: None,
            text,
            category,
            language,
            posted,
            external_id,
            created_at: chrono::Utc::now().timestamp(),
            length,
        }
    }
}

/// An inbound mention, keyed by its platform id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MentionRecord {
    pub external_id: String,
    pub text: String,
    pub author_handle: String,
    pub author_id: String,
    pub replied: bool,
    pub replied_at: Option<i64>,
    pub created_at: i64,
}

impl MentionRecord {
    /// First observation of a mention: not yet replied
    pub fn observed(
        external_id: String,
        text: String,
        author_handle: String,
        author_id: String,
    ) -> Self {
        Self {
            external_id,
            text,
            author_handle,
            author_id,
            replied: false,
            replied_at: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A reply that was successfully published
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyRecord {
    pub id: Option<i64>,
    pub parent_external_id: String,
    pub parent_text: String,
    pub author_handle: String,
    pub reply_text: String,
    pub reply_external_id: Option<String>,
    pub created_at: i64,
}

impl ReplyRecord {
    pub fn new(
        parent_external_id: String,
        parent_text: String,
        author_handle: String,
        reply_text: String,
        reply_external_id: Option<String>,
    ) -> Self {
        Self {
            id: None,
            parent_external_id,
            parent_text,
            author_handle,
            reply_text,
            reply_external_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Aggregate counts over the activity store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub connected: bool,
    pub database: Option<String>,
    pub posts_count: i64,
    pub posted_posts: i64,
    pub replies_count: i64,
    pub mentions_count: i64,
    pub replied_mentions: i64,
    pub conversation_events: i64,
}
