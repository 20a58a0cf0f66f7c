// vaultdb-backend-fs/src/lib.rs
//! A local-filesystem `BlobStore`/`PropertyStore` pair: the reference
//! backend that lets `vaultdb-core` run end to end without an actual
//! cloud-drive SDK. One `<handle>.json` file per collection blob, plus
//! a single `properties.json` file for the property store.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use fs2::FileExt;
use serde_json::Value;
use uuid::Uuid;
use vaultdb_core::error::{Result, VaultError};
use vaultdb_core::{BlobStore, PropertyStore};

/// Stores each collection as `<base_dir>/<handle>.json`.
pub struct FsBlobStore {
    base_dir: PathBuf,
}

impl FsBlobStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(io_err)?;
        Ok(FsBlobStore { base_dir })
    }

    fn path_for(&self, handle: &str) -> PathBuf {
        self.base_dir.join(format!("{handle}.json"))
    }
}

impl BlobStore for FsBlobStore {
    fn read_file(&self, handle: &str) -> Result<Value> {
        let path = self.path_for(handle);
        let raw = fs::read_to_string(&path)
            .map_err(|e| VaultError::NotFound(format!("no blob at handle {handle:?}: {e}")))?;
        serde_json::from_str(&raw).map_err(VaultError::from)
    }

    fn write_file(&self, handle: &str, content: &Value) -> Result<()> {
        let path = self.path_for(handle);
        let raw = serde_json::to_string_pretty(content)?;
        fs::write(&path, raw).map_err(io_err)
    }

    fn create_file(&self, name: &str, content: &Value) -> Result<String> {
        let handle = format!("{}-{}", sanitize(name), Uuid::new_v4());
        self.write_file(&handle, content)?;
        Ok(handle)
    }

    fn delete_file(&self, handle: &str) -> Result<()> {
        let path = self.path_for(handle);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn io_err(e: std::io::Error) -> VaultError {
    VaultError::BackendUnavailable(format!("filesystem error: {e}"))
}

/// Stores the property map as a single JSON object in one file, guarded
/// by an OS advisory lock so two processes on the same machine can
/// serialise their read-modify-write cycles over the master index.
pub struct FsPropertyStore {
    path: PathBuf,
}

impl FsPropertyStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            fs::write(&path, "{}").map_err(io_err)?;
        }
        Ok(FsPropertyStore { path })
    }

    fn read_map(&self) -> Result<serde_json::Map<String, Value>> {
        let raw = fs::read_to_string(&self.path).map_err(io_err)?;
        let value: Value = serde_json::from_str(&raw).map_err(VaultError::from)?;
        value
            .as_object()
            .cloned()
            .ok_or_else(|| VaultError::InternalError("properties.json is not a JSON object".to_string()))
    }

    fn write_map(&self, map: &serde_json::Map<String, Value>) -> Result<()> {
        let raw = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, raw).map_err(io_err)
    }

    fn lock_file_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }
}

impl PropertyStore for FsPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
    }

    fn with_exclusive_lock<R>(&self, timeout_ms: u64, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock_path = self.lock_file_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(io_err)?;

        let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => return Err(VaultError::LockTimeout(timeout_ms)),
            }
        }

        let result = f();
        let _ = lock_file.unlock();
        result
    }
}
