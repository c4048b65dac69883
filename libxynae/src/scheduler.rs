//! Cooperative posting and mention-check loop
//!
//! One task drives two interval timers. Each [`Scheduler::tick`] checks
//! mentions if that timer is due, posts if that timer is due, and returns
//! how long to wait before the next tick. [`Scheduler::run`] repeats that
//! until the shutdown flag is raised, turning unexpected failures into a
//! fixed backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::clock::Clock;
use crate::error::Result;

/// Wait after an unexpected loop-level failure
pub const ERROR_BACKOFF: Duration = Duration::from_secs(300);

/// Longest uninterrupted sleep; shutdown is observed between slices
const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    IdleWait,
    CheckingMentions,
    Posting,
    Backoff,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchedulerState::IdleWait => "idle-wait",
            SchedulerState::CheckingMentions => "checking-mentions",
            SchedulerState::Posting => "posting",
            SchedulerState::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

pub struct Scheduler {
    agent: Agent,
    clock: Arc<dyn Clock>,
    post_interval: Duration,
    check_interval: Duration,
    /// `None` means never, which is always due
    last_post: Option<Duration>,
    last_check: Option<Duration>,
    state: SchedulerState,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        agent: Agent,
        clock: Arc<dyn Clock>,
        post_interval: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            agent,
            clock,
            post_interval,
            check_interval,
            last_post: None,
            last_check: None,
            state: SchedulerState::IdleWait,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned shutdown flag (e.g. one set by a signal handler)
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run one iteration and return the pause before the next
    ///
    /// # Errors
    ///
    /// Non-platform failures from the posting step. The post timer is not
    /// advanced in that case.
    pub async fn tick(&mut self) -> Result<Duration> {
        let now = self.clock.now();

        if self.agent.has_social_client() && is_due(self.last_check, now, self.check_interval) {
            self.state = SchedulerState::CheckingMentions;
            info!("Checking for new mentions");
            let summary = self.agent.check_and_reply().await;
            debug!(
                "Mention check: {} fetched, {} skipped, {} replied, {} failed",
                summary.fetched, summary.skipped, summary.replied, summary.failed
            );
            self.last_check = Some(now);
        }

        if is_due(self.last_post, now, self.post_interval) {
            self.state = SchedulerState::Posting;
            let record = self.agent.post_scheduled().await?;
            debug!(
                "Post attempt finished: posted={}, {} chars",
                record.posted, record.length
            );
            self.last_post = Some(now);
        }

        self.state = SchedulerState::IdleWait;
        Ok(self.next_pause(now))
    }

    fn next_pause(&self, now: Duration) -> Duration {
        let until_post = match self.last_post {
            Some(last) => self
                .post_interval
                .saturating_sub(now.saturating_sub(last)),
            None => Duration::ZERO,
        };
        self.check_interval.min(until_post)
    }

    /// Loop until shutdown, then stop the agent
    pub async fn run(mut self) {
        info!(
            "Scheduler started: posting every {}s, checking mentions every {}s",
            self.post_interval.as_secs(),
            self.check_interval.as_secs()
        );

        while !self.is_shutdown() {
            let pause = match self.tick().await {
                Ok(pause) => pause,
                Err(e) => {
                    self.state = SchedulerState::Backoff;
                    error!(
                        "Loop iteration failed: {}. Retrying in {}s",
                        e,
                        ERROR_BACKOFF.as_secs()
                    );
                    ERROR_BACKOFF
                }
            };

            debug!("Next iteration in {}s", pause.as_secs());
            self.pause(pause).await;
        }

        info!("Shutting down gracefully");
        self.finish().await;
    }

    /// Stop the agent without looping (used after one-shot ticks)
    pub async fn finish(self) {
        self.agent.shutdown().await;
    }

    async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            // Still yield so a zero-interval loop cannot starve the runtime
            self.clock.sleep(Duration::ZERO).await;
            return;
        }

        let mut remaining = duration;
        while !remaining.is_zero() && !self.is_shutdown() {
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice).await;
            remaining -= slice;
        }
    }
}

fn is_due(last: Option<Duration>, now: Duration, interval: Duration) -> bool {
    match last {
        Some(last) => now.saturating_sub(last) >= interval,
        None => true,
    }
}
