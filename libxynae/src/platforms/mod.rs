//! Social platform abstraction
//!
//! The agent talks to its platform only through [`SocialClient`]. The X API
//! v2 implementation lives in [`x`]; [`mock`] provides a scriptable client
//! for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::XConfig;
use crate::error::{PlatformError, Result, XynaeError};

pub mod x;

// Mock client is available for all builds (not just tests) to support integration tests
pub mod mock;

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub handle: String,
}

/// An inbound post referencing the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub handle: String,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
}

/// Operations the agent needs from a social platform
///
/// All methods fail with `XynaeError::Platform` carrying the
/// platform-reported detail.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Lowercase platform identifier
    fn name(&self) -> &str;

    /// Resolve the authenticated account
    async fn get_self(&self) -> Result<Identity>;

    /// Most recent mentions of `user_id`, newest first, at most `max`
    async fn get_mentions(&self, user_id: &str, max: usize) -> Result<Vec<Mention>>;

    async fn get_user(&self, user_id: &str) -> Result<UserProfile>;

    /// Publish a standalone post
    async fn post_text(&self, text: &str) -> Result<PublishedPost>;

    /// Publish a reply to `parent_id`
    async fn post_reply(&self, text: &str, parent_id: &str) -> Result<PublishedPost>;
}

/// Build the X client and confirm its identity
///
/// Returns `None` (reduced-capability mode) when the access token is missing
/// or rejected. Any other lookup failure is treated as transient: the client
/// is kept and identity is resolved again on each mention check.
pub async fn connect(config: &XConfig) -> Option<Box<dyn SocialClient>> {
    let client = match x::XClient::from_env(config) {
        Ok(client) => client,
        Err(e) => {
            warn!("X client not configured ({}), posting disabled", e);
            return None;
        }
    };

    match client.get_self().await {
        Ok(identity) => info!("Authenticated with X as @{}", identity.handle),
        Err(XynaeError::Platform(PlatformError::Authentication(detail))) => {
            warn!("X rejected the access token ({}), posting disabled", detail);
            return None;
        }
        Err(e) => warn!("X identity lookup failed ({}), will retry on next use", e),
    }
    Some(Box::new(client))
}
