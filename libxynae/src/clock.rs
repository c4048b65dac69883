//! Injectable time source for the scheduler
//!
//! The loop only ever asks "how long since start?" and "wait this long", so
//! tests can swap in [`ManualClock`] and advance virtual time instantly.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio's timer
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately after advancing time
///
/// Optionally raises a shutdown flag once virtual time reaches a deadline,
/// which lets tests bound an otherwise endless loop.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
    stop: Option<(Duration, Arc<AtomicBool>)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flag` once virtual time reaches `deadline`
    pub fn stop_at(self, deadline: Duration, flag: Arc<AtomicBool>) -> Self {
        self.state.lock().unwrap().stop = Some((deadline, flag));
        self
    }

    /// Move virtual time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.elapsed += duration;
        Self::check_stop(&state);
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().unwrap().sleeps.clone()
    }

    /// Sum of all recorded sleeps
    pub fn total_slept(&self) -> Duration {
        self.state.lock().unwrap().sleeps.iter().sum()
    }

    fn check_stop(state: &ManualState) {
        if let Some((deadline, flag)) = &state.stop {
            if state.elapsed >= *deadline {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.state.lock().unwrap().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.elapsed += duration;
        state.sleeps.push(duration);
        Self::check_stop(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_secs(5)).await;
        clock.sleep(Duration::from_secs(2)).await;

        assert_eq!(clock.now(), Duration::from_secs(7));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(2)]
        );
        assert_eq!(clock.total_slept(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_manual_clock_advance_is_not_a_sleep() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), Duration::from_secs(30));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_manual_clock_raises_stop_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let clock = ManualClock::new().stop_at(Duration::from_secs(10), flag.clone());

        clock.sleep(Duration::from_secs(9)).await;
        assert!(!flag.load(Ordering::Relaxed));

        clock.sleep(Duration::from_secs(1)).await;
        assert!(flag.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.sleep(Duration::from_secs(3)).await;
        assert_eq!(other.now(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_system_clock_sleep() {
        let clock = SystemClock::new();
        clock.sleep(Duration::from_millis(20)).await;
        assert!(clock.now() >= Duration::from_millis(20));
    }
}
