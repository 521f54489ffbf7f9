use std::time::Duration;

use async_trait::async_trait;

/// Injectable delay so backoff loops can be tested without wall-clock time
///
/// Cancellation is the caller's job: sleeps are always raced against a
/// `CancellationToken`.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delay on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
