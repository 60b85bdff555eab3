//! Injectable time source for settle delays and status polling.

use std::time::Duration;

use async_trait::async_trait;

/// Monotonic clock used by the stimulus scripts and the capture poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
///
/// Honors `tokio::time::pause`, so tests may run it on virtual time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Clock whose zero is now.
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}
