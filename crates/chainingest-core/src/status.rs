//! Shared sync status: the one piece of state written by the engine's
//! tasks and read by outside pollers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use num_bigint::BigUint;
use serde::{Serialize, Serializer};

use crate::types::{height_string, Height};

/// Observable engine status.
///
/// Serializes as `{"connected": bool, "sync": "<0-100>%", "current": "<height>"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// A node connection has been established and the dispatcher is running.
    pub connected: bool,
    /// Historical sync progress, 0–100.
    #[serde(rename = "sync", serialize_with = "percent")]
    pub synced: u8,
    /// Height of the last event the dispatcher consumed.
    #[serde(with = "height_string")]
    pub current: Height,
}

impl SyncStatus {
    /// Progress as shown to pollers (`"42%"`).
    pub fn sync_label(&self) -> String {
        format!("{}%", self.synced)
    }
}

fn percent<S: Serializer>(pct: &u8, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{pct}%"))
}

/// Cloneable handle to the shared [`SyncStatus`].
///
/// Every read and write takes the same lock. Readers only ever get copies.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<SyncStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SyncStatus> {
        // Writes are single-field assignments; a poisoned status is still whole.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> SyncStatus {
        self.lock().clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn set_synced(&self, pct: u8) {
        self.lock().synced = pct.min(100);
    }

    pub fn set_current(&self, height: &BigUint) {
        self.lock().current = height.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_a_copy() {
        let handle = StatusHandle::new();
        let before = handle.snapshot();
        handle.set_connected(true);
        handle.set_current(&BigUint::from(42u32));
        assert!(!before.connected);
        assert_eq!(handle.snapshot().current, BigUint::from(42u32));
    }

    #[test]
    fn synced_is_clamped() {
        let handle = StatusHandle::new();
        handle.set_synced(250);
        assert_eq!(handle.snapshot().synced, 100);
    }

    #[test]
    fn serializes_as_status_map() {
        let handle = StatusHandle::new();
        handle.set_connected(true);
        handle.set_synced(37);
        handle.set_current(&BigUint::from(19_000_123u64));
        let v = serde_json::to_value(handle.snapshot()).unwrap();
        assert_eq!(v["connected"], true);
        assert_eq!(v["sync"], "37%");
        assert_eq!(v["current"], "19000123");
    }

    #[test]
    fn handle_clones_share_state() {
        let a = StatusHandle::new();
        let b = a.clone();
        b.set_synced(5);
        assert_eq!(a.snapshot().sync_label(), "5%");
    }
}
