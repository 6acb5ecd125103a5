//! Small timing helpers shared by the wait points: cancellable sleeps,
//! humanizing jitter and short duration labels.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;

/// Longest uninterrupted sleep; bounds stop latency.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_millis(1_000);

/// Inclusive millisecond range for randomized pauses.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JitterRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Sleeps for `duration` in slices of at most one second, checking `cancel`
/// between slices. Returns `false` when the wait was cut short.
pub async fn sleep_cancellable(
    clock: &dyn Clock,
    cancel: &CancellationToken,
    duration: Duration,
) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(MAX_SLEEP_SLICE);
        clock.sleep(slice).await;
        remaining -= slice;
    }
    !cancel.is_cancelled()
}

/// Formats a millisecond span as `"45s"` or `"2m 5s"`, rounding up.
pub fn format_time_short(ms: u64) -> String {
    let total = ms.div_ceil(1_000);
    if total < 60 {
        return format!("{total}s");
    }
    format!("{}m {}s", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn formats_short_durations() {
        assert_eq!(format_time_short(0), "0s");
        assert_eq!(format_time_short(1), "1s");
        assert_eq!(format_time_short(45_000), "45s");
        assert_eq!(format_time_short(59_001), "1m 0s");
        assert_eq!(format_time_short(125_000), "2m 5s");
    }

    #[test]
    fn jitter_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let range = JitterRange::new(120, 340);
        for _ in 0..200 {
            let d = range.sample(&mut rng).as_millis() as u64;
            assert!((120..=340).contains(&d));
        }
        let swapped = JitterRange::new(9, 3).sample(&mut rng).as_millis() as u64;
        assert!((3..=9).contains(&swapped));
    }

    #[tokio::test]
    async fn cancellable_sleep_stops_between_slices() {
        let clock = ManualClock::new(0);
        let cancel = CancellationToken::new();
        assert!(sleep_cancellable(&clock, &cancel, Duration::from_millis(2_500)).await);
        assert_eq!(clock.now_ms(), 2_500);

        cancel.cancel();
        assert!(!sleep_cancellable(&clock, &cancel, Duration::from_secs(120)).await);
        assert_eq!(clock.now_ms(), 2_500);
    }
}
