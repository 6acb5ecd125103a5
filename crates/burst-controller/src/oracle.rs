//! Decides whether an action actually consumed charges.
//!
//! A dispatched action is only trusted when some count went down afterwards.
//! Counts come from two places: the host page (local) and status reads
//! (authoritative, compared against the model count before the action).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationVerdict {
    pub success: bool,
    /// Units believed consumed; 0 on failure.
    pub consumed: u32,
}

impl ConfirmationVerdict {
    pub const FAILED: ConfirmationVerdict = ConfirmationVerdict {
        success: false,
        consumed: 0,
    };
}

/// Classifies one series of counts read after an action.
///
/// With a known `before`, the largest drop below it is the consumption.
/// Without one, a drop between consecutive readings still proves the action
/// landed, but its size is unknown and `batch` clamped to `available` is
/// assumed instead.
pub fn classify(
    committed: bool,
    before: Option<u32>,
    observed: &[u32],
    batch: u32,
    available: u32,
) -> ConfirmationVerdict {
    if !committed {
        return ConfirmationVerdict::FAILED;
    }
    match before {
        Some(before) => {
            let largest = observed
                .iter()
                .map(|count| before.saturating_sub(*count))
                .max()
                .unwrap_or(0);
            if largest == 0 {
                return ConfirmationVerdict::FAILED;
            }
            ConfirmationVerdict {
                success: true,
                consumed: largest,
            }
        }
        None => {
            let dropped = observed.windows(2).any(|pair| pair[1] < pair[0]);
            if !dropped {
                return ConfirmationVerdict::FAILED;
            }
            ConfirmationVerdict {
                success: true,
                consumed: batch.min(available).max(1),
            }
        }
    }
}

/// Readings gathered during one confirmation window.
#[derive(Clone, Debug, Default)]
pub struct ConfirmationWindow {
    model_before: u32,
    local_before: Option<u32>,
    local: Vec<u32>,
    authoritative: Vec<u32>,
}

impl ConfirmationWindow {
    pub fn new(model_before: u32, local_before: Option<u32>) -> Self {
        Self {
            model_before,
            local_before,
            local: Vec::new(),
            authoritative: Vec::new(),
        }
    }

    pub fn record_local(&mut self, count: u32) {
        self.local.push(count);
    }

    pub fn record_authoritative(&mut self, count: u32) {
        self.authoritative.push(count);
    }

    /// `true` once any status read happened inside this window.
    pub fn had_authoritative_read(&self) -> bool {
        !self.authoritative.is_empty()
    }

    /// Strict decrease seen by any source; ends the window early.
    pub fn decreased(&self) -> bool {
        let local_drop = match self.local_before {
            Some(before) => self.local.iter().any(|c| *c < before),
            None => self.local.windows(2).any(|pair| pair[1] < pair[0]),
        };
        local_drop || self.authoritative.iter().any(|c| *c < self.model_before)
    }

    pub fn verdict(&self, committed: bool, batch: u32) -> ConfirmationVerdict {
        let local = classify(
            committed,
            self.local_before,
            &self.local,
            batch,
            self.model_before,
        );
        let authoritative = classify(
            committed,
            Some(self.model_before),
            &self.authoritative,
            batch,
            self.model_before,
        );
        ConfirmationVerdict {
            success: local.success || authoritative.success,
            consumed: local.consumed.max(authoritative.consumed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_drop_confirms_one_unit() {
        let verdict = classify(true, Some(12), &[12, 12, 11], 1, 12);
        assert_eq!(
            verdict,
            ConfirmationVerdict {
                success: true,
                consumed: 1
            }
        );
    }

    #[test]
    fn flat_counts_are_a_failure() {
        assert_eq!(
            classify(true, Some(12), &[12, 12, 12], 1, 12),
            ConfirmationVerdict::FAILED
        );
    }

    #[test]
    fn uncommitted_action_never_succeeds() {
        assert_eq!(
            classify(false, Some(12), &[11], 1, 12),
            ConfirmationVerdict::FAILED
        );
    }

    #[test]
    fn largest_drop_wins() {
        let verdict = classify(true, Some(20), &[19, 17, 18], 3, 20);
        assert_eq!(verdict.consumed, 3);
    }

    #[test]
    fn unknown_baseline_falls_back_to_batch() {
        let verdict = classify(true, None, &[9, 9, 7], 5, 3);
        assert_eq!(
            verdict,
            ConfirmationVerdict {
                success: true,
                consumed: 3
            }
        );
        assert!(!classify(true, None, &[9], 5, 3).success);
    }

    #[test]
    fn window_combines_sources() {
        let mut window = ConfirmationWindow::new(12, None);
        window.record_authoritative(12);
        assert!(!window.decreased());
        window.record_authoritative(10);
        assert!(window.decreased());
        assert!(window.had_authoritative_read());
        assert_eq!(
            window.verdict(true, 1),
            ConfirmationVerdict {
                success: true,
                consumed: 2
            }
        );
        assert_eq!(window.verdict(false, 1), ConfirmationVerdict::FAILED);
    }
}
