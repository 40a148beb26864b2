//! Port for waiting between remote attempts.

use async_trait::async_trait;
use std::time::Duration;

/// Suspends the caller for a duration.
#[async_trait]
pub trait Delay: Send + Sync {
    /// Waits for `duration`.
    async fn wait(&self, duration: Duration);
}

/// [`Delay`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
