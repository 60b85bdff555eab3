//! Virtual clock for deterministic sequencing tests.

use async_trait::async_trait;
use bench_core::clock::Clock;
use std::sync::Mutex;
use std::time::Duration;

use crate::common::lock;

/// Clock whose `sleep` advances virtual time instantly.
///
/// Every requested sleep is recorded, so a test can check the exact settle
/// delays of a stimulus script. Time is shared by every task using the same
/// clock, so concurrent sleeps add up.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without a sleep.
    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    /// Sum of all requested sleeps.
    pub fn total_slept(&self) -> Duration {
        lock(&self.sleeps).iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }

    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
