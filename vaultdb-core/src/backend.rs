// src/backend.rs
//! The two traits a host embedding VaultDB must implement: a blob store
//! for collection contents and a property store for small key/value
//! metadata (the master index). `vaultdb-backend-fs` is the reference
//! implementation of both against the local filesystem; a production
//! host would implement these against a real cloud-drive API and a
//! durable key/value service respectively.

use serde_json::Value;

use crate::error::Result;

/// Opaque JSON-blob storage, keyed by an opaque handle the store itself
/// assigns on creation (e.g. a file ID).
pub trait BlobStore: Send + Sync {
    fn read_file(&self, handle: &str) -> Result<Value>;
    fn write_file(&self, handle: &str, content: &Value) -> Result<()>;
    /// Create a new blob with an initial value, returning its handle.
    fn create_file(&self, name: &str, content: &Value) -> Result<String>;
    fn delete_file(&self, handle: &str) -> Result<()>;
}

/// Small string key/value storage used for the master index, with a
/// coarse-grained exclusive lock the coordination layer uses to
/// serialise master-index read-modify-write cycles across processes.
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;

    /// Run `f` while holding an exclusive lock on this store, waiting up
    /// to `timeout_ms` to acquire it.
    fn with_exclusive_lock<R>(&self, timeout_ms: u64, f: impl FnOnce() -> Result<R>) -> Result<R>;
}
