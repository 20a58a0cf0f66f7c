// src/file_service.rs
//! A small read-through, write-behind cache in front of `BlobStore`,
//! keyed by backend handle. Writes are suppressed when the cached entry
//! isn't dirty, and a circuit breaker trips after a run of consecutive
//! backend failures so callers fail fast with `BackendUnavailable`
//! instead of retrying a backend that is clearly down.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backend::BlobStore;
use crate::error::{Result, VaultError};
use crate::{log_debug, log_warn};

struct CacheEntry {
    content: Value,
    loaded_at: DateTime<Utc>,
    dirty: bool,
}

pub struct FileService<B: BlobStore> {
    backend: B,
    cache: HashMap<String, CacheEntry>,
    consecutive_failures: u32,
    circuit_breaker_threshold: u32,
    circuit_breaker_cooloff_ms: u64,
    circuit_opened_at: Option<DateTime<Utc>>,
}

impl<B: BlobStore> FileService<B> {
    pub fn new(backend: B, circuit_breaker_threshold: u32, circuit_breaker_cooloff_ms: u64) -> Self {
        FileService {
            backend,
            cache: HashMap::new(),
            consecutive_failures: 0,
            circuit_breaker_threshold,
            circuit_breaker_cooloff_ms,
            circuit_opened_at: None,
        }
    }

    fn circuit_is_open(&self, now: DateTime<Utc>) -> bool {
        match self.circuit_opened_at {
            None => false,
            Some(opened_at) => {
                let cooloff = chrono::Duration::milliseconds(self.circuit_breaker_cooloff_ms as i64);
                now < opened_at + cooloff
            }
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.circuit_opened_at = None;
    }

    fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.circuit_breaker_threshold && self.circuit_opened_at.is_none() {
            log_warn!(
                "file service circuit breaker tripped after {} consecutive failures",
                self.consecutive_failures
            );
            self.circuit_opened_at = Some(now);
        }
    }

    fn guard_circuit(&self, now: DateTime<Utc>) -> Result<()> {
        if self.circuit_is_open(now) {
            return Err(VaultError::BackendUnavailable(
                "circuit breaker open; backend considered unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a blob, preferring the cache. Always consults the backend on
    /// a cache miss.
    pub fn read(&mut self, handle: &str, now: DateTime<Utc>) -> Result<Value> {
        self.guard_circuit(now)?;
        if let Some(entry) = self.cache.get(handle) {
            return Ok(entry.content.clone());
        }
        match self.backend.read_file(handle) {
            Ok(content) => {
                self.record_success();
                self.cache.insert(
                    handle.to_string(),
                    CacheEntry {
                        content: content.clone(),
                        loaded_at: now,
                        dirty: false,
                    },
                );
                Ok(content)
            }
            Err(e) => {
                self.record_failure(now);
                Err(e)
            }
        }
    }

    /// Stage a write in the cache, marking it dirty. Does not touch the
    /// backend until `flush` is called for this handle.
    pub fn write_cached(&mut self, handle: &str, content: Value, now: DateTime<Utc>) {
        self.cache.insert(
            handle.to_string(),
            CacheEntry {
                content,
                loaded_at: now,
                dirty: true,
            },
        );
    }

    /// Persist a dirty entry to the backend. A no-op (and no backend
    /// call) if the entry isn't dirty, so repeated flushes of an
    /// unmodified collection cost nothing.
    pub fn flush(&mut self, handle: &str, now: DateTime<Utc>) -> Result<()> {
        self.guard_circuit(now)?;
        let Some(entry) = self.cache.get(handle) else {
            return Ok(());
        };
        if !entry.dirty {
            log_debug!("skipping flush of clean cache entry for handle {handle}");
            return Ok(());
        }
        match self.backend.write_file(handle, &entry.content) {
            Ok(()) => {
                self.record_success();
                if let Some(entry) = self.cache.get_mut(handle) {
                    entry.dirty = false;
                }
                Ok(())
            }
            Err(e) => {
                self.record_failure(now);
                Err(e)
            }
        }
    }

    pub fn create(&mut self, name: &str, content: Value, now: DateTime<Utc>) -> Result<String> {
        self.guard_circuit(now)?;
        match self.backend.create_file(name, &content) {
            Ok(handle) => {
                self.record_success();
                self.cache.insert(
                    handle.clone(),
                    CacheEntry {
                        content,
                        loaded_at: now,
                        dirty: false,
                    },
                );
                Ok(handle)
            }
            Err(e) => {
                self.record_failure(now);
                Err(e)
            }
        }
    }

    pub fn delete(&mut self, handle: &str, now: DateTime<Utc>) -> Result<()> {
        self.guard_circuit(now)?;
        match self.backend.delete_file(handle) {
            Ok(()) => {
                self.record_success();
                self.cache.remove(handle);
                Ok(())
            }
            Err(e) => {
                self.record_failure(now);
                Err(e)
            }
        }
    }

    pub fn is_cached(&self, handle: &str) -> bool {
        self.cache.contains_key(handle)
    }

    pub fn cached_since(&self, handle: &str) -> Option<DateTime<Utc>> {
        self.cache.get(handle).map(|e| e.loaded_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FlakyBackend {
        fail_next: Arc<Mutex<u32>>,
        store: Arc<Mutex<HashMap<String, Value>>>,
    }

    impl FlakyBackend {
        fn fail_next_n(&self, n: u32) {
            *self.fail_next.lock() = n;
        }
    }

    impl BlobStore for FlakyBackend {
        fn read_file(&self, handle: &str) -> Result<Value> {
            let mut fail = self.fail_next.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(VaultError::BackendUnavailable("simulated failure".to_string()));
            }
            Ok(self.store.lock().get(handle).cloned().unwrap_or(Value::Null))
        }
        fn write_file(&self, handle: &str, content: &Value) -> Result<()> {
            let mut fail = self.fail_next.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(VaultError::BackendUnavailable("simulated failure".to_string()));
            }
            self.store.lock().insert(handle.to_string(), content.clone());
            Ok(())
        }
        fn create_file(&self, _name: &str, content: &Value) -> Result<String> {
            let handle = "handle-1".to_string();
            self.store.lock().insert(handle.clone(), content.clone());
            Ok(handle)
        }
        fn delete_file(&self, handle: &str) -> Result<()> {
            self.store.lock().remove(handle);
            Ok(())
        }
    }

    #[test]
    fn read_populates_cache_and_subsequent_reads_skip_backend() {
        let backend = FlakyBackend::default();
        backend.store.lock().insert("h1".to_string(), json!({"a": 1}));
        let mut svc = FileService::new(backend.clone(), 3, 5_000);
        let now = Utc::now();
        assert_eq!(svc.read("h1", now).unwrap(), json!({"a": 1}));
        assert!(svc.is_cached("h1"));

        backend.fail_next_n(10);
        assert_eq!(svc.read("h1", now).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn flush_skips_backend_when_not_dirty() {
        let backend = FlakyBackend::default();
        backend.store.lock().insert("h1".to_string(), json!({"a": 1}));
        let mut svc = FileService::new(backend.clone(), 3, 5_000);
        let now = Utc::now();
        svc.read("h1", now).unwrap();
        backend.fail_next_n(10);
        assert!(svc.flush("h1", now).is_ok());
    }

    #[test]
    fn flush_writes_dirty_entries() {
        let backend = FlakyBackend::default();
        let mut svc = FileService::new(backend.clone(), 3, 5_000);
        let now = Utc::now();
        svc.write_cached("h1", json!({"a": 2}), now);
        svc.flush("h1", now).unwrap();
        assert_eq!(backend.store.lock().get("h1"), Some(&json!({"a": 2})));
    }

    #[test]
    fn circuit_breaker_trips_after_threshold_failures() {
        let backend = FlakyBackend::default();
        backend.fail_next_n(10);
        let mut svc = FileService::new(backend, 2, 5_000);
        let now = Utc::now();
        assert!(svc.read("h1", now).is_err());
        assert!(svc.read("h1", now).is_err());
        let err = svc.read("h1", now).unwrap_err();
        assert!(matches!(err, VaultError::BackendUnavailable(_)));
    }

    #[test]
    fn circuit_breaker_closes_after_cooloff() {
        let backend = FlakyBackend::default();
        backend.fail_next_n(2);
        let mut svc = FileService::new(backend.clone(), 2, 1_000);
        let now = Utc::now();
        assert!(svc.read("h1", now).is_err());
        assert!(svc.read("h1", now).is_err());
        assert!(matches!(svc.read("h1", now).unwrap_err(), VaultError::BackendUnavailable(_)));

        let later = now + chrono::Duration::milliseconds(2_000);
        backend.store.lock().insert("h1".to_string(), json!({"ok": true}));
        assert_eq!(svc.read("h1", later).unwrap(), json!({"ok": true}));
    }
}
