// src/collection.rs
//! Public collection API: the type applications actually call. Each
//! method here is one complete unit of work — acquire locks, load the
//! blob if needed, dispatch to `DocumentOperations`, persist, publish
//! metadata, release locks — with the lock release guaranteed by
//! `ProcessLockGuard`'s `Drop` impl regardless of which branch returns.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::backend::{BlobStore, PropertyStore};
use crate::collection_metadata::CollectionMetadata;
use crate::document::Document;
use crate::document_ops::{DocumentOperations, UpdateResult};
use crate::error::{Result, VaultError};
use crate::query::Query;

/// The on-disk shape of one collection blob: its documents plus a
/// metadata snapshot, so the blob is self-describing even if read
/// outside of a `Database` (e.g. for backup/inspection).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionBlob {
    documents: HashMap<String, Value>,
    metadata: CollectionMetadata,
}

pub struct Collection<'a, B: BlobStore, P: PropertyStore> {
    pub(crate) name: String,
    pub(crate) db: &'a mut crate::database::Database<B, P>,
}

impl<'a, B: BlobStore, P: PropertyStore> Collection<'a, B, P> {
    fn load(&mut self) -> Result<(DocumentOperations, CollectionMetadata)> {
        let handle = self
            .db
            .master_index
            .get_collection(&self.name)
            .ok_or_else(|| VaultError::NotFound(format!("collection {:?} does not exist", self.name)))?
            .file_handle
            .clone();
        let now = Utc::now();
        let raw = self.db.file_service.read(&handle, now)?;
        let blob: CollectionBlob = serde_json::from_value(raw)?;
        let mut documents = HashMap::with_capacity(blob.documents.len());
        for (id, value) in blob.documents {
            documents.insert(id, Document::from_value(value)?);
        }
        Ok((DocumentOperations::from_map(documents), blob.metadata))
    }

    /// Publish this collection's documents and metadata. Before writing,
    /// re-reads the master index straight from the property store and
    /// checks the token this call loaded against whatever is recorded
    /// there now — if another instance published in between, the write is
    /// rejected (or forced through, per `ConflictStrategy::Overwrite`)
    /// instead of silently clobbering the concurrent change.
    ///
    /// The freshly-read index, not this handle's possibly-stale in-memory
    /// copy, becomes the new in-memory state once the metadata update is
    /// folded in — so the blob actually written to the property store
    /// never carries this call's own in-flight collection lock entry (that
    /// lock is purely advisory and local to this `with_locks` call; it has
    /// no business outliving it in the persisted index).
    fn persist(&mut self, ops: &DocumentOperations, metadata: CollectionMetadata) -> Result<()> {
        let expected_token = metadata.modification_token.clone();
        let mut fresh_index = self.db.load_master_index_from_store()?;
        fresh_index.resolve_conflict(&self.name, &expected_token, self.db.config.conflict_strategy)?;

        let mut metadata = metadata;
        metadata.mark_modified(ops.len());
        let documents: HashMap<String, Value> = ops
            .as_map()
            .iter()
            .map(|(id, doc)| (id.clone(), doc.as_value().clone()))
            .collect();
        let blob = CollectionBlob { documents, metadata: metadata.clone() };
        let now = Utc::now();
        let content = serde_json::to_value(&blob)?;
        self.db.file_service.write_cached(&metadata.file_handle, content, now);
        self.db.file_service.flush(&metadata.file_handle, now)?;

        fresh_index.update_collection_metadata(metadata);
        self.db.master_index = fresh_index;
        self.db.persist_master_index()
    }

    /// Run one unit of work under the process-wide lock and the
    /// collection's application lock, releasing both on every exit path.
    fn with_locks<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let _process_guard = self.db.lock_service.acquire_process_lock(None)?;
        let operation_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let timeout = self.db.config.default_lock_timeout_ms;
        self.db
            .lock_service
            .acquire_collection_lock(&mut self.db.master_index, &self.name, &operation_id, Some(timeout), now)?;
        let result = f(self);
        self.db.lock_service.release_collection_lock(&mut self.db.master_index, &self.name);
        result
    }

    pub fn insert_one(&mut self, document: Value) -> Result<Document> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let inserted = ops.insert(document)?;
            this.persist(&ops, metadata)?;
            Ok(inserted)
        })
    }

    pub fn find_one(&mut self, filter: &Value) -> Result<Option<Document>> {
        self.with_locks(|this| {
            let (ops, _metadata) = this.load()?;
            if let Some(id) = Query::from_filter(filter.clone()).as_id_lookup() {
                return Ok(ops.find_by_id(id).cloned());
            }
            Ok(ops.find_by_filter(filter)?.cloned())
        })
    }

    pub fn find(&mut self, filter: &Value) -> Result<Vec<Document>> {
        self.with_locks(|this| {
            let (ops, _metadata) = this.load()?;
            if let Some(id) = Query::from_filter(filter.clone()).as_id_lookup() {
                return Ok(ops.find_by_id(id).cloned().into_iter().collect());
            }
            Ok(ops.find_all_by_filter(filter)?.into_iter().cloned().collect())
        })
    }

    pub fn count_documents(&mut self, filter: &Value) -> Result<usize> {
        self.with_locks(|this| {
            let (ops, _metadata) = this.load()?;
            ops.count_by_filter(filter)
        })
    }

    pub fn update_one(&mut self, filter: &Value, update: &Value) -> Result<UpdateResult> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let id = match Query::from_filter(filter.clone()).as_id_lookup() {
                Some(id) => Some(id.to_string()),
                None => ops.find_by_filter(filter)?.map(|d| d.id().to_string()),
            };
            let result = match id {
                Some(id) => ops.update_by_id_with_operators(&id, update)?,
                None => UpdateResult::default(),
            };
            if result.modified > 0 {
                this.persist(&ops, metadata)?;
            }
            Ok(result)
        })
    }

    pub fn update_many(&mut self, filter: &Value, update: &Value) -> Result<UpdateResult> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let result = ops.update_all_by_filter(filter, update)?;
            if result.modified > 0 {
                this.persist(&ops, metadata)?;
            }
            Ok(result)
        })
    }

    pub fn replace_one(&mut self, filter: &Value, replacement: Value) -> Result<Document> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let id = match Query::from_filter(filter.clone()).as_id_lookup() {
                Some(id) => id.to_string(),
                None => ops
                    .find_by_filter(filter)?
                    .map(|d| d.id().to_string())
                    .ok_or_else(|| VaultError::NotFound("no document matches the given filter".to_string()))?,
            };
            let replaced = ops.replace_by_id(&id, replacement)?;
            this.persist(&ops, metadata)?;
            Ok(replaced)
        })
    }

    pub fn delete_one(&mut self, filter: &Value) -> Result<bool> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let id = match Query::from_filter(filter.clone()).as_id_lookup() {
                Some(id) => Some(id.to_string()),
                None => ops.find_by_filter(filter)?.map(|d| d.id().to_string()),
            };
            let deleted = match id {
                Some(id) => ops.delete_by_id(&id).is_some(),
                None => false,
            };
            if deleted {
                this.persist(&ops, metadata)?;
            }
            Ok(deleted)
        })
    }

    pub fn delete_many(&mut self, filter: &Value) -> Result<usize> {
        self.with_locks(|this| {
            let (mut ops, metadata) = this.load()?;
            let deleted = ops.delete_by_filter(filter)?;
            if deleted > 0 {
                this.persist(&ops, metadata)?;
            }
            Ok(deleted)
        })
    }
}
