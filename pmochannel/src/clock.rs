//! Time and randomness capabilities used by the poller.
//!
//! The poll loop never touches the wall clock directly: it asks a [`Clock`]
//! for the current instant and suspends through [`Clock::sleep`], and draws
//! its jitter from a [`Jitter`]. Production code uses [`TokioClock`] and
//! [`RandomJitter`]; tests and simulations use [`ManualClock`] and
//! [`FixedJitter`] so that no wait is ever real.
//!
//! ```
//! use pmochannel::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let clock = ManualClock::new();
//! clock.sleep(Duration::from_secs(15)).await;
//! assert_eq!(clock.elapsed(), Duration::from_secs(15));
//! # });
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::time::{Duration, Instant};

/// Source of time and cooperative suspension
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Suspend the calling task; never blocks the thread
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: sleeping advances time instantly and is recorded
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Random addition to a wait duration
pub trait Jitter: Send + Sync {
    /// A duration in `[0, window)`; zero when the window is empty
    fn sample(&self, window: Duration) -> Duration;
}

/// Uniform jitter drawn from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self, window: Duration) -> Duration {
        let window_ms = window.as_millis() as u64;
        if window_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..window_ms))
    }
}

/// Jitter returning a constant, capped below the window
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn sample(&self, window: Duration) -> Duration {
        if window.is_zero() {
            Duration::ZERO
        } else {
            self.0.min(window.saturating_sub(Duration::from_millis(1)))
        }
    }
}
