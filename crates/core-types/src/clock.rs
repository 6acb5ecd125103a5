//! Time source used by every wait point in the controller.
//!
//! Production code runs on [`SystemClock`]; tests drive the loop on
//! [`ManualClock`], where sleeping advances virtual time instantly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Timestamp;

#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> Timestamp;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `factor` times faster than the wall clock. Used to play a
/// simulated session in seconds instead of hours. Measures elapsed time on
/// the tokio clock, so paused test runtimes drive it too.
#[derive(Debug, Clone)]
pub struct ScaledClock {
    origin: Instant,
    start_ms: Timestamp,
    factor: u32,
}

impl ScaledClock {
    pub fn new(factor: u32) -> Self {
        Self {
            origin: Instant::now(),
            start_ms: SystemClock.now_ms(),
            factor: factor.max(1),
        }
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }
}

#[async_trait]
impl Clock for ScaledClock {
    fn now_ms(&self) -> Timestamp {
        let real = self.origin.elapsed().as_millis() as u64;
        self.start_ms + real.saturating_mul(self.factor as u64)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration / self.factor).await;
    }
}

/// Virtual clock. Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    slept: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
            slept: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: Timestamp) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Total virtual time spent inside `sleep`.
    pub fn slept_ms(&self) -> u64 {
        self.slept.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.slept.fetch_add(ms, Ordering::SeqCst);
        self.now.fetch_add(ms, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new(1_000);
        let shared = clock.clone();
        clock.sleep(Duration::from_millis(1_500)).await;
        assert_eq!(shared.now_ms(), 2_500);
        assert_eq!(shared.slept_ms(), 1_500);

        shared.advance(Duration::from_secs(1));
        assert_eq!(clock.now_ms(), 3_500);
        assert_eq!(clock.slept_ms(), 1_500);
    }

    #[tokio::test(start_paused = true)]
    async fn scaled_clock_compresses_sleeps() {
        let clock = ScaledClock::new(100);
        let before = tokio::time::Instant::now();
        clock.sleep(Duration::from_secs(10)).await;
        assert_eq!(tokio::time::Instant::now() - before, Duration::from_millis(100));
        assert_eq!(ScaledClock::new(0).factor(), 1);
    }

    #[test]
    fn system_clock_is_past_epoch() {
        assert!(SystemClock.now_ms() > 1_600_000_000_000);
    }
}
