//! Reply deduplication
//!
//! Exactly one source of truth is active per agent, chosen once at startup:
//! the store's `replied` flag when the store is connected, otherwise a small
//! in-memory window of recently replied mention ids.

use std::collections::{HashSet, VecDeque};

use crate::store::ActivityStore;
use crate::types::{MentionRecord, ReplyRecord};

/// Capacity of the in-memory window
pub const RECENT_REPLY_CAPACITY: usize = 100;

/// Insertion-ordered set that forgets its oldest entries past `capacity`
#[derive(Debug, Clone)]
pub struct RecentIds {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Insert an id, evicting the oldest entries once over capacity
    ///
    /// Re-inserting a present id does not refresh its position.
    pub fn insert(&mut self, id: &str) {
        if !self.members.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Source of truth for "have we already replied to this mention?"
pub enum ReplyTracker {
    Store(ActivityStore),
    Memory(RecentIds),
}

impl ReplyTracker {
    /// Pick the dedup source based on store connectivity
    pub fn for_store(store: &ActivityStore) -> Self {
        if store.is_connected() {
            ReplyTracker::Store(store.clone())
        } else {
            ReplyTracker::Memory(RecentIds::new(RECENT_REPLY_CAPACITY))
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, ReplyTracker::Store(_))
    }

    pub async fn already_replied(&self, mention_id: &str) -> bool {
        match self {
            ReplyTracker::Store(store) => store.is_mention_replied(mention_id).await,
            ReplyTracker::Memory(recent) => recent.contains(mention_id),
        }
    }

    /// Record a mention before replying (store mode only)
    ///
    /// Persisting first means a crash mid-reply leaves an unreplied row that
    /// is safely picked up again on the next check.
    pub async fn observe(&self, mention: &MentionRecord) {
        if let ReplyTracker::Store(store) = self {
            store.save_mention(mention).await;
        }
    }

    /// Mark the mention replied after a successful publish
    pub async fn mark_replied(&mut self, reply: &ReplyRecord) {
        match self {
            ReplyTracker::Store(store) => {
                store.record_reply(reply).await;
            }
            ReplyTracker::Memory(recent) => recent.insert(&reply.parent_external_id),
        }
    }
}
