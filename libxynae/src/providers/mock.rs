//! Mock LLM provider for testing
//!
//! Clones share their call log, so a test can hand one clone to the
//! [`ProviderManager`](super::ProviderManager) and inspect the other.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{ProviderError, ProviderResult};
use crate::providers::{GenerationRequest, Provider};

/// What the mock does when asked to generate
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(String),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    available: bool,
    behavior: Arc<Mutex<MockBehavior>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockProvider {
    pub fn new(name: &str, available: bool, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            available,
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that always returns `text`
    pub fn succeeding(name: &str, text: &str) -> Self {
        Self::new(name, true, MockBehavior::Succeed(text.to_string()))
    }

    /// A provider whose every call fails with `message`
    pub fn failing(name: &str, message: &str) -> Self {
        Self::new(name, true, MockBehavior::Fail(message.to_string()))
    }

    /// A provider that reports itself unavailable
    pub fn unavailable(name: &str) -> Self {
        Self::new(name, false, MockBehavior::Fail("unavailable".to_string()))
    }

    /// Change behavior for subsequent calls (shared across clones)
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Prompts seen so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(request.clone());

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            MockBehavior::Succeed(text) => Ok(text),
            MockBehavior::Fail(message) => Err(ProviderError::generation(&self.name, message)),
        }
    }
}
