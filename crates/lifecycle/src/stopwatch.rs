use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Resettable stopwatch safe to restart from any thread without locking
#[derive(Debug)]
pub struct IdleStopwatch {
    base: Instant,
    /// Milliseconds since `base` at the last restart
    started_at: AtomicU64,
}

impl IdleStopwatch {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            started_at: AtomicU64::new(0),
        }
    }

    pub fn restart(&self) {
        self.started_at.store(self.since_base(), Ordering::Release);
    }

    /// Time elapsed since the last restart
    pub fn taken(&self) -> Duration {
        let started = self.started_at.load(Ordering::Acquire);
        Duration::from_millis(self.since_base().saturating_sub(started))
    }

    fn since_base(&self) -> u64 {
        u64::try_from(self.base.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for IdleStopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_elapsed() {
        let watch = IdleStopwatch::new();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(watch.taken(), Duration::from_secs(5));

        watch.restart();
        assert_eq!(watch.taken(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(watch.taken(), Duration::from_millis(1500));
    }
}
