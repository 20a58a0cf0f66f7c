// src/lock_service.rs
//! Two independent locking mechanisms:
//!
//! - a **process-wide exclusive lock** (an in-process `parking_lot::Mutex`)
//!   that every public `Collection` call holds for its duration, so two
//!   threads in the same process never race on the in-memory state;
//! - a **per-collection application lock**, recorded as an entry in the
//!   master index and therefore visible across processes/hosts sharing
//!   the same backend. It's advisory only — nothing stops a misbehaving
//!   writer from ignoring it — which is why `MasterIndex`'s modification
//!   tokens exist as the real safety net.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::error::{Result, VaultError};
use crate::master_index::{LockEntry, MasterIndex};
use crate::{log_warn};

pub struct LockService {
    process_lock: Mutex<()>,
    default_timeout_ms: u64,
    min_timeout_ms: u64,
}

/// Held for the duration of one `Collection` call. Releases the
/// process-wide lock on drop regardless of how the call exits.
pub struct ProcessLockGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl LockService {
    pub fn new(default_timeout_ms: u64, min_timeout_ms: u64) -> Self {
        LockService {
            process_lock: Mutex::new(()),
            default_timeout_ms,
            min_timeout_ms,
        }
    }

    fn clamp_timeout(&self, requested: Option<u64>) -> u64 {
        let timeout = requested.unwrap_or(self.default_timeout_ms);
        if timeout < self.min_timeout_ms {
            log_warn!(
                "requested lock timeout {}ms is below the minimum of {}ms; clamping",
                timeout,
                self.min_timeout_ms
            );
            self.min_timeout_ms
        } else {
            timeout
        }
    }

    /// Acquire the process-wide exclusive lock, waiting up to
    /// `timeout_ms` (or the configured default).
    pub fn acquire_process_lock(&self, timeout_ms: Option<u64>) -> Result<ProcessLockGuard<'_>> {
        let timeout = self.clamp_timeout(timeout_ms);
        match self.process_lock.try_lock_for(Duration::from_millis(timeout)) {
            Some(guard) => Ok(ProcessLockGuard(guard)),
            None => Err(VaultError::LockTimeout(timeout)),
        }
    }

    /// Acquire the per-collection application lock recorded in the master
    /// index. Expired entries are swept first, so a crashed holder's lock
    /// does not wedge the collection forever. Re-entrant for the same
    /// `operation_id`.
    pub fn acquire_collection_lock(
        &self,
        index: &mut MasterIndex,
        collection: &str,
        operation_id: &str,
        timeout_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let timeout = self.clamp_timeout(timeout_ms);
        index.cleanup_expired_locks(now);
        if let Some(existing) = index.get_lock(collection) {
            if existing.operation_id != operation_id {
                return Err(VaultError::LockTimeout(timeout));
            }
        }
        index.set_lock(
            collection,
            LockEntry {
                operation_id: operation_id.to_string(),
                acquired_at: now,
                expires_at: now + chrono::Duration::milliseconds(timeout as i64),
            },
        );
        Ok(())
    }

    pub fn release_collection_lock(&self, index: &mut MasterIndex, collection: &str) {
        index.clear_lock(collection);
    }

    pub fn is_collection_locked(&self, index: &MasterIndex, collection: &str, now: DateTime<Utc>) -> bool {
        index
            .get_lock(collection)
            .is_some_and(|entry| entry.expires_at > now)
    }

    pub fn cleanup_expired_collection_locks(&self, index: &mut MasterIndex, now: DateTime<Utc>) {
        index.cleanup_expired_locks(now);
    }
}
