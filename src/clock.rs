use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Abstraction over monotonic time and cancellable sleeping.
///
/// Production code uses [`TokioClock`]. Tests substitute the same
/// `tokio::time` primitives under `tokio::time::pause()`, so a single
/// fake clock implementation is unnecessary: pausing tokio's own clock and
/// driving it with `tokio::time::advance()` gives deterministic control
/// over every `sleep` this crate issues.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);

    async fn sleep_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now).await;
        }
    }
}

/// Wraps `tokio::time`. The only production implementation of [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_with_paused_time() {
        let clock = TokioClock;
        let start = clock.now();
        let sleeper = tokio::spawn(async move {
            clock.sleep(Duration::from_millis(500)).await;
        });
        tokio::time::advance(Duration::from_millis(500)).await;
        sleeper.await.unwrap();
        assert!(TokioClock.now() - start >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_past_deadline_returns_immediately() {
        let clock = TokioClock;
        let now = clock.now();
        clock.sleep_until(now - Duration::from_secs(1)).await;
    }
}
