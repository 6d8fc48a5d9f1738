//! Settling delay between a host trigger and the recompute it causes.
//!
//! The host may still be writing the entry that fired the trigger, so work
//! is deferred by a fixed, configurable delay. The recompute itself knows
//! nothing about timing.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settle {
    delay: Duration,
}

impl Settle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the settling delay. Returns at once for a zero delay.
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Run `f` once the delay has elapsed.
    pub async fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        self.wait().await;
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_run_waits_for_delay() {
        let settle = Settle::new(Duration::from_millis(30));
        let start = Instant::now();
        let value = settle.run(|| 7).await;
        assert_eq!(value, 7);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_zero_delay_runs_immediately() {
        let settle = Settle::new(Duration::ZERO);
        let start = Instant::now();
        settle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
