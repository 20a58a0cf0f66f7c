// src/master_index.rs
//! The master index: a single JSON blob, held in the property store
//! under a configurable key, that is the source of truth for which
//! collections exist, their metadata, and which are currently locked.
//! Every process sharing a backend reads and writes the same blob, so
//! it is also where cross-process modification conflicts are detected.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection_metadata::CollectionMetadata;
use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub operation_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterIndexData {
    pub collections: HashMap<String, CollectionMetadata>,
    pub locks: HashMap<String, LockEntry>,
    pub version: u64,
}

/// What to do when a write's expected modification token does not match
/// the token currently on record for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Write anyway, discarding the conflicting state.
    Overwrite,
    /// Reject the write with `VaultError::Conflict`.
    Abort,
    /// Accepted for API compatibility; behaves identically to `Abort`
    /// since VaultDB has no field-level merge semantics to fall back on.
    Merge,
}

#[derive(Debug, Clone, Default)]
pub struct MasterIndex {
    data: MasterIndexData,
}

impl MasterIndex {
    pub fn new() -> Self {
        MasterIndex::default()
    }

    pub fn from_data(data: MasterIndexData) -> Self {
        MasterIndex { data }
    }

    pub fn data(&self) -> &MasterIndexData {
        &self.data
    }

    pub fn add_collection(&mut self, metadata: CollectionMetadata) {
        self.data.collections.insert(metadata.name.clone(), metadata);
        self.data.version += 1;
    }

    pub fn remove_collection(&mut self, name: &str) -> Option<CollectionMetadata> {
        let removed = self.data.collections.remove(name);
        if removed.is_some() {
            self.data.version += 1;
        }
        removed
    }

    pub fn get_collection(&self, name: &str) -> Option<&CollectionMetadata> {
        self.data.collections.get(name)
    }

    pub fn update_collection_metadata(&mut self, metadata: CollectionMetadata) {
        self.data.collections.insert(metadata.name.clone(), metadata);
        self.data.version += 1;
    }

    pub fn generate_modification_token(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// A write conflicts if the token it expected to find no longer
    /// matches what's recorded for the collection (another process
    /// persisted in between this caller's read and write).
    pub fn has_conflict(&self, collection: &str, expected_token: &str) -> bool {
        match self.get_collection(collection) {
            Some(meta) => meta.modification_token != expected_token,
            None => false,
        }
    }

    pub fn resolve_conflict(
        &self,
        collection: &str,
        expected_token: &str,
        strategy: ConflictStrategy,
    ) -> Result<()> {
        if !self.has_conflict(collection, expected_token) {
            return Ok(());
        }
        match strategy {
            ConflictStrategy::Overwrite => Ok(()),
            ConflictStrategy::Abort | ConflictStrategy::Merge => {
                let actual = self
                    .get_collection(collection)
                    .map(|m| m.modification_token.clone())
                    .unwrap_or_default();
                Err(VaultError::Conflict {
                    collection: collection.to_string(),
                    expected: expected_token.to_string(),
                    actual,
                })
            }
        }
    }

    pub fn set_lock(&mut self, collection: &str, entry: LockEntry) {
        self.data.locks.insert(collection.to_string(), entry);
    }

    pub fn clear_lock(&mut self, collection: &str) {
        self.data.locks.remove(collection);
    }

    pub fn get_lock(&self, collection: &str) -> Option<&LockEntry> {
        self.data.locks.get(collection)
    }

    /// Drop any lock entries whose `expires_at` is in the past relative
    /// to `now`.
    pub fn cleanup_expired_locks(&mut self, now: DateTime<Utc>) {
        self.data.locks.retain(|_, entry| entry.expires_at > now);
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.data).map_err(VaultError::from)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let data: MasterIndexData = serde_json::from_str(raw).map_err(VaultError::from)?;
        Ok(MasterIndex { data })
    }
}
