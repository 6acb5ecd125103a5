//! Detection and clearing of the blocking security interstitial.
//!
//! Detection is pure logic over a cheap page observation supplied by a
//! [`ChallengeProbe`]; it never touches the network, so it can run on every
//! loop iteration. The [`ChallengeMonitor`] drives a single clearing attempt
//! per occurrence and escalates to a human when that attempt does not work.

pub mod detect;
pub mod monitor;
pub mod probe;

pub use detect::{detect, ChallengeObservation, ChallengeSignals, ElementHint, ElementKind};
pub use monitor::{ChallengeMonitor, ChallengeOutcome, ChallengeState, MonitorConfig, MonitorDeps};
pub use probe::{most_specific, ChallengeProbe, DispatchStrategy, InterstitialElement};
