// src/database.rs
//! The top-level entry point: owns the shared coordination state (file
//! cache, lock service, master index) that every `Collection` handle
//! borrows for the duration of one call.

use chrono::Utc;

use crate::backend::{BlobStore, PropertyStore};
use crate::collection::Collection;
use crate::collection_metadata::CollectionMetadata;
use crate::config::DatabaseConfig;
use crate::error::{Result, VaultError};
use crate::file_service::FileService;
use crate::lock_service::LockService;
use crate::log_info;
use crate::master_index::MasterIndex;

pub struct Database<B: BlobStore, P: PropertyStore> {
    pub(crate) config: DatabaseConfig,
    pub(crate) file_service: FileService<B>,
    pub(crate) lock_service: LockService,
    pub(crate) property_store: P,
    pub(crate) master_index: MasterIndex,
}

impl<B: BlobStore, P: PropertyStore> Database<B, P> {
    /// Open a database against the given backends, loading the master
    /// index from the property store if one already exists there (a
    /// fresh backend gets an empty index).
    pub fn open(config: DatabaseConfig, blob_store: B, property_store: P) -> Result<Self> {
        let master_index = match property_store.get(&config.master_index_key)? {
            Some(raw) => MasterIndex::from_json(&raw)?,
            None => {
                log_info!("no master index found at key {:?}; starting fresh", config.master_index_key);
                MasterIndex::new()
            }
        };
        let file_service = FileService::new(
            blob_store,
            config.circuit_breaker_threshold,
            config.circuit_breaker_cooloff_ms,
        );
        let lock_service = LockService::new(config.default_lock_timeout_ms, config.min_lock_timeout_ms);
        Ok(Database {
            config,
            file_service,
            lock_service,
            property_store,
            master_index,
        })
    }

    pub(crate) fn persist_master_index(&mut self) -> Result<()> {
        let data = self.master_index.to_json()?;
        let key = self.config.master_index_key.clone();
        self.property_store
            .with_exclusive_lock(self.config.default_lock_timeout_ms, || self.property_store.set(&key, &data))
    }

    /// Read the master index directly from the property store, independent
    /// of whatever this `Database`'s in-memory copy currently holds. Used
    /// to detect a concurrent writer's publish that happened after this
    /// instance last synced.
    pub(crate) fn load_master_index_from_store(&self) -> Result<MasterIndex> {
        match self.property_store.get(&self.config.master_index_key)? {
            Some(raw) => MasterIndex::from_json(&raw),
            None => Ok(MasterIndex::new()),
        }
    }

    pub fn create_collection(&mut self, name: &str) -> Result<()> {
        if self.master_index.get_collection(name).is_some() {
            return Err(VaultError::InvalidArgument(format!("collection {name:?} already exists")));
        }
        let now = Utc::now();
        let handle = self.file_service.create(name, serde_json::json!({"documents": {}, "metadata": null}), now)?;
        let metadata = CollectionMetadata::new(name, handle.clone());
        let blob = serde_json::json!({"documents": {}, "metadata": metadata});
        self.file_service.write_cached(&handle, blob, now);
        self.file_service.flush(&handle, now)?;
        self.master_index.add_collection(metadata);
        self.persist_master_index()
    }

    pub fn collection(&mut self, name: &str) -> Result<Collection<'_, B, P>> {
        if self.master_index.get_collection(name).is_none() {
            return Err(VaultError::NotFound(format!("collection {name:?} does not exist")));
        }
        Ok(Collection {
            name: name.to_string(),
            db: self,
        })
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.master_index.data().collections.keys().cloned().collect()
    }

    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        let handle = self
            .master_index
            .get_collection(name)
            .ok_or_else(|| VaultError::NotFound(format!("collection {name:?} does not exist")))?
            .file_handle
            .clone();
        let now = Utc::now();
        self.file_service.delete(&handle, now)?;
        self.master_index.remove_collection(name);
        self.persist_master_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MemoryBlobStore {
        files: Arc<Mutex<HashMap<String, Value>>>,
        next_id: Arc<Mutex<u64>>,
    }

    impl BlobStore for MemoryBlobStore {
        fn read_file(&self, handle: &str) -> Result<Value> {
            self.files
                .lock()
                .get(handle)
                .cloned()
                .ok_or_else(|| VaultError::NotFound(format!("no such file {handle}")))
        }
        fn write_file(&self, handle: &str, content: &Value) -> Result<()> {
            self.files.lock().insert(handle.to_string(), content.clone());
            Ok(())
        }
        fn create_file(&self, _name: &str, content: &Value) -> Result<String> {
            let mut id = self.next_id.lock();
            *id += 1;
            let handle = format!("file-{id}");
            self.files.lock().insert(handle.clone(), content.clone());
            Ok(handle)
        }
        fn delete_file(&self, handle: &str) -> Result<()> {
            self.files.lock().remove(handle);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryPropertyStore {
        props: Arc<Mutex<HashMap<String, String>>>,
    }

    impl PropertyStore for MemoryPropertyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.props.lock().get(key).cloned())
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.props.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn delete(&self, key: &str) -> Result<()> {
            self.props.lock().remove(key);
            Ok(())
        }
        fn with_exclusive_lock<R>(&self, _timeout_ms: u64, f: impl FnOnce() -> Result<R>) -> Result<R> {
            f()
        }
    }

    #[test]
    fn create_list_and_drop_collection() {
        let mut db = Database::open(DatabaseConfig::default(), MemoryBlobStore::default(), MemoryPropertyStore::default()).unwrap();
        db.create_collection("people").unwrap();
        assert_eq!(db.list_collections(), vec!["people".to_string()]);
        db.drop_collection("people").unwrap();
        assert!(db.list_collections().is_empty());
    }

    #[test]
    fn create_collection_twice_errors() {
        let mut db = Database::open(DatabaseConfig::default(), MemoryBlobStore::default(), MemoryPropertyStore::default()).unwrap();
        db.create_collection("people").unwrap();
        let err = db.create_collection("people").unwrap_err();
        assert!(matches!(err, VaultError::InvalidArgument(_)));
    }

    #[test]
    fn master_index_survives_reopen() {
        let blob_store = MemoryBlobStore::default();
        let property_store = MemoryPropertyStore::default();
        {
            let mut db = Database::open(DatabaseConfig::default(), blob_store.clone(), property_store.clone()).unwrap();
            db.create_collection("people").unwrap();
        }
        let db2 = Database::open(DatabaseConfig::default(), blob_store, property_store).unwrap();
        assert_eq!(db2.list_collections(), vec!["people".to_string()]);
    }
}
