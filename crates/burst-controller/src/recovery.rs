//! Session recovery bookkeeping that has to survive a host reload.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use autofarm_core_types::Timestamp;

use crate::settings::FarmSettings;
use crate::store::StoreError;

/// Written right before a forced reload so the next start can resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecoveryIntent {
    pub auto_start: bool,
    pub saved_at: Timestamp,
    pub reason: String,
    pub settings: FarmSettings,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RecoveryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intent: Option<SessionRecoveryIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_recovery_at: Option<Timestamp>,
}

pub trait RecoveryStore: Send + Sync {
    fn save_intent(&self, intent: &SessionRecoveryIntent) -> Result<(), StoreError>;
    /// Reads and deletes the pending intent.
    fn take_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError>;
    /// Reads the pending intent without consuming it.
    fn peek_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError>;
    fn last_recovery_at(&self) -> Result<Option<Timestamp>, StoreError>;
    fn mark_recovery(&self, at: Timestamp) -> Result<(), StoreError>;
    /// Drops the intent and the recovery timestamp.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Consumes the pending intent. It is deleted whether or not it is still
/// fresh; only an intent at most `freshness_ms` old is returned.
pub fn consume_recovery_intent(
    store: &dyn RecoveryStore,
    now: Timestamp,
    freshness_ms: u64,
) -> Result<Option<SessionRecoveryIntent>, StoreError> {
    let Some(intent) = store.take_intent()? else {
        return Ok(None);
    };
    let age = now.saturating_sub(intent.saved_at);
    if age > freshness_ms {
        info!(age_ms = age, "discarding stale recovery intent");
        return Ok(None);
    }
    debug!(age_ms = age, reason = %intent.reason, "recovery intent honoured");
    Ok(Some(intent))
}

/// JSON record on disk holding the intent and the last recovery time.
#[derive(Debug)]
pub struct FileRecoveryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRecoveryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RecoveryRecord, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(RecoveryRecord::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RecoveryRecord::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, record: &RecoveryRecord) -> Result<(), StoreError> {
        if record == &RecoveryRecord::default() {
            return match fs::remove_file(&self.path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(record)?)?;
        Ok(())
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut RecoveryRecord) -> T,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let mut record = self.read()?;
        let out = apply(&mut record);
        self.write(&record)?;
        Ok(out)
    }
}

impl RecoveryStore for FileRecoveryStore {
    fn save_intent(&self, intent: &SessionRecoveryIntent) -> Result<(), StoreError> {
        self.update(|record| record.intent = Some(intent.clone()))
    }

    fn take_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError> {
        self.update(|record| record.intent.take())
    }

    fn peek_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.intent)
    }

    fn last_recovery_at(&self) -> Result<Option<Timestamp>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.last_recovery_at)
    }

    fn mark_recovery(&self, at: Timestamp) -> Result<(), StoreError> {
        self.update(|record| record.last_recovery_at = Some(at))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|record| *record = RecoveryRecord::default())
    }
}

/// In-process store. Writes can be made to fail to exercise the abort path.
#[derive(Debug, Default)]
pub struct MemoryRecoveryStore {
    record: Mutex<RecoveryRecord>,
    fail_writes: AtomicBool,
}

impl MemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl RecoveryStore for MemoryRecoveryStore {
    fn save_intent(&self, intent: &SessionRecoveryIntent) -> Result<(), StoreError> {
        self.check_writable()?;
        self.record.lock().intent = Some(intent.clone());
        Ok(())
    }

    fn take_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError> {
        Ok(self.record.lock().intent.take())
    }

    fn peek_intent(&self) -> Result<Option<SessionRecoveryIntent>, StoreError> {
        Ok(self.record.lock().intent.clone())
    }

    fn last_recovery_at(&self) -> Result<Option<Timestamp>, StoreError> {
        Ok(self.record.lock().last_recovery_at)
    }

    fn mark_recovery(&self, at: Timestamp) -> Result<(), StoreError> {
        self.check_writable()?;
        self.record.lock().last_recovery_at = Some(at);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.record.lock() = RecoveryRecord::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(saved_at: Timestamp) -> SessionRecoveryIntent {
        SessionRecoveryIntent {
            auto_start: true,
            saved_at,
            reason: "5 consecutive failures".into(),
            settings: FarmSettings::default(),
        }
    }

    #[test]
    fn stale_intent_is_discarded_and_deleted() {
        let store = MemoryRecoveryStore::new();
        store.save_intent(&intent(0)).unwrap();
        assert_eq!(consume_recovery_intent(&store, 70_000, 60_000).unwrap(), None);
        assert_eq!(store.peek_intent().unwrap(), None);
    }

    #[test]
    fn fresh_intent_is_honoured_once() {
        let store = MemoryRecoveryStore::new();
        store.save_intent(&intent(0)).unwrap();
        let first = consume_recovery_intent(&store, 10_000, 60_000).unwrap();
        assert_eq!(first, Some(intent(0)));
        assert_eq!(consume_recovery_intent(&store, 10_001, 60_000).unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/recovery.json");
        {
            let store = FileRecoveryStore::new(&path);
            store.save_intent(&intent(5_000)).unwrap();
            store.mark_recovery(5_000).unwrap();
        }
        let store = FileRecoveryStore::new(&path);
        assert_eq!(store.last_recovery_at().unwrap(), Some(5_000));
        let taken = consume_recovery_intent(&store, 15_000, 60_000).unwrap();
        assert_eq!(taken.map(|i| i.saved_at), Some(5_000));
        assert_eq!(store.peek_intent().unwrap(), None);
        // the recovery time outlives the intent
        assert_eq!(store.last_recovery_at().unwrap(), Some(5_000));

        store.clear().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn memory_store_can_refuse_writes() {
        let store = MemoryRecoveryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save_intent(&intent(0)),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.peek_intent().unwrap(), None);
    }
}
