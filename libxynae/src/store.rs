//! Activity store with graceful degradation
//!
//! Every operation here is infallible from the caller's point of view. When
//! the database is unreachable (or a single query fails) the call logs a
//! warning and returns a sentinel: `None`, `false`, an empty `Vec`, or
//! disconnected stats. The loop never stops because of persistence.

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::types::{MentionRecord, PostRecord, ReplyRecord, StoreStats};

#[derive(Clone, Default)]
pub struct ActivityStore {
    db: Option<Database>,
}

impl ActivityStore {
    /// Connect according to the `[database]` config section
    ///
    /// A disabled or unreachable database yields a disconnected store.
    pub async fn connect(config: &DatabaseConfig) -> Self {
        if !config.enabled {
            info!("Database disabled, running in memory-only mode");
            return Self::disconnected();
        }

        match Database::new(&config.path).await {
            Ok(db) => {
                info!("Connected to activity store at {}", db.path());
                Self { db: Some(db) }
            }
            Err(e) => {
                warn!("Store unavailable ({}), running in memory-only mode", e);
                Self::disconnected()
            }
        }
    }

    /// A store with no backing database
    pub fn disconnected() -> Self {
        Self { db: None }
    }

    /// Wrap an already-open database
    pub fn from_database(db: Database) -> Self {
        Self { db: Some(db) }
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    /// The underlying database, for callers that cannot work without one
    pub fn require(&self) -> Result<&Database> {
        self.db
            .as_ref()
            .ok_or_else(|| DbError::Unavailable("database not connected".to_string()).into())
    }

    pub async fn save_post(&self, post: &PostRecord) -> Option<i64> {
        let db = self.db.as_ref()?;
        db.save_post(post)
            .await
            .map_err(|e| warn!("Failed to save post: {}", e))
            .ok()
    }

    pub async fn save_reply(&self, reply: &ReplyRecord) -> Option<i64> {
        let db = self.db.as_ref()?;
        db.save_reply(reply)
            .await
            .map_err(|e| warn!("Failed to save reply: {}", e))
            .ok()
    }

    /// Returns `Some(true)` when this call inserted the mention
    pub async fn save_mention(&self, mention: &MentionRecord) -> Option<bool> {
        let db = self.db.as_ref()?;
        db.save_mention(mention)
            .await
            .map_err(|e| warn!("Failed to save mention {}: {}", mention.external_id, e))
            .ok()
    }

    /// Returns `Some(true)` when this call flipped the flag
    pub async fn mark_mention_replied(&self, external_id: &str) -> Option<bool> {
        let db = self.db.as_ref()?;
        db.mark_mention_replied(external_id, chrono::Utc::now().timestamp())
            .await
            .map_err(|e| warn!("Failed to mark mention {} replied: {}", external_id, e))
            .ok()
    }

    /// Mark the mention replied and store the reply atomically
    pub async fn record_reply(&self, reply: &ReplyRecord) -> Option<i64> {
        let db = self.db.as_ref()?;
        db.record_reply(reply)
            .await
            .map_err(|e| {
                warn!(
                    "Failed to record reply to {}: {}",
                    reply.parent_external_id, e
                )
            })
            .ok()
    }

    pub async fn is_mention_replied(&self, external_id: &str) -> bool {
        let Some(db) = self.db.as_ref() else {
            return false;
        };
        db.is_mention_replied(external_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to look up mention {}: {}", external_id, e);
                false
            })
    }

    pub async fn save_conversation_event(
        &self,
        kind: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Option<i64> {
        let db = self.db.as_ref()?;
        db.save_conversation_event(kind, content, &metadata)
            .await
            .map_err(|e| warn!("Failed to save conversation event: {}", e))
            .ok()
    }

    pub async fn recent_posts(&self, limit: usize) -> Vec<PostRecord> {
        let Some(db) = self.db.as_ref() else {
            return Vec::new();
        };
        db.recent_posts(limit).await.unwrap_or_else(|e| {
            warn!("Failed to load recent posts: {}", e);
            Vec::new()
        })
    }

    pub async fn recent_replies(&self, limit: usize) -> Vec<ReplyRecord> {
        let Some(db) = self.db.as_ref() else {
            return Vec::new();
        };
        db.recent_replies(limit).await.unwrap_or_else(|e| {
            warn!("Failed to load recent replies: {}", e);
            Vec::new()
        })
    }

    pub async fn stats(&self) -> StoreStats {
        let Some(db) = self.db.as_ref() else {
            return StoreStats::default();
        };
        db.stats().await.unwrap_or_else(|e| {
            warn!("Failed to load store stats: {}", e);
            StoreStats::default()
        })
    }

    /// Release the connection pool
    pub async fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close().await;
        }
    }
}
