//! Xynae - autonomous AI posting agent
//!
//! This library provides the agent that composes posts with an LLM, publishes
//! them to a social platform on a schedule, and replies to mentions at most
//! once each, recording activity in a local store when one is available.

pub mod agent;
pub mod clock;
pub mod config;
pub mod content;
pub mod db;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use agent::{Agent, CheckSummary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use content::{Language, Persona, PostCategory};
pub use db::Database;
pub use error::{ProviderError, Result, XynaeError};
pub use providers::{GenerationRequest, ProviderManager};
pub use scheduler::{Scheduler, SchedulerState};
pub use store::ActivityStore;
pub use types::{MentionRecord, PostRecord, ReplyRecord, StoreStats};
