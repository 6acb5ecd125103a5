//! The scheduling loop that turns available charges into painted units.
//!
//! [`BurstController`] owns all mutable session state. Host capabilities
//! ([`ActionSink`], [`ChallengeProbe`](autofarm_challenge_monitor::ChallengeProbe),
//! [`RemoteStatusGate`](autofarm_status_gate::RemoteStatusGate),
//! [`ReloadHook`]) and persistence ([`SettingsStore`], [`RecoveryStore`]) are
//! injected through [`BurstControllerBuilder`].

pub mod controller;
pub mod errors;
pub mod oracle;
pub mod ports;
pub mod recovery;
pub mod settings;
pub mod sim;
pub mod store;

pub use controller::{
    BurstController, BurstControllerBuilder, ControllerPhase, HaltReason, SessionStats,
    StepOutcome,
};
pub use errors::ControllerError;
pub use oracle::{classify, ConfirmationVerdict};
pub use ports::{ActionSink, ReloadHook};
pub use recovery::{
    consume_recovery_intent, FileRecoveryStore, MemoryRecoveryStore, RecoveryStore,
    SessionRecoveryIntent,
};
pub use settings::{ControllerTuning, FarmSettings, SettingsError};
pub use sim::{SimConfig, SimulatedWorld};
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore, StoreError};
