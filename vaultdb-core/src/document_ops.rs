// src/document_ops.rs
//! In-memory per-collection document store. Holds one collection's
//! documents keyed by `_id` and delegates filter/update evaluation to
//! the query and update engines; `Collection` is the layer above this
//! that adds locking, persistence, and metadata bookkeeping.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::document::Document;
use crate::error::{Result, VaultError};
use crate::query::{self, operators::matches_filter};
use crate::update;

#[derive(Debug, Clone, Default)]
pub struct DocumentOperations {
    documents: HashMap<String, Document>,
}

/// Outcome of an update that may touch zero, one, or many documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: usize,
    pub modified: usize,
}

impl DocumentOperations {
    pub fn new() -> Self {
        DocumentOperations::default()
    }

    pub fn from_map(documents: HashMap<String, Document>) -> Self {
        DocumentOperations { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, Document> {
        &self.documents
    }

    /// Insert a document, auto-assigning a UUID v4 `_id` if absent.
    /// Rejects documents whose `_id` is already present (`DuplicateKey`).
    pub fn insert(&mut self, mut value: Value) -> Result<Document> {
        let obj = value
            .as_object_mut()
            .ok_or_else(|| VaultError::InvalidDocument("document must be a JSON object".to_string()))?;
        if !obj.contains_key("_id") {
            obj.insert("_id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let document = Document::from_value(value)?;
        let id = document.id().to_string();
        if self.documents.contains_key(&id) {
            return Err(VaultError::DuplicateKey(id));
        }
        self.documents.insert(id, document.clone());
        Ok(document)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn find_all(&self) -> Vec<&Document> {
        self.documents.values().collect()
    }

    pub fn find_by_filter(&self, filter: &Value) -> Result<Option<&Document>> {
        query::find_first(self.documents.values(), filter)
    }

    pub fn find_all_by_filter(&self, filter: &Value) -> Result<Vec<&Document>> {
        query::find_all(self.documents.values(), filter)
    }

    pub fn count_by_filter(&self, filter: &Value) -> Result<usize> {
        query::count(self.documents.values(), filter)
    }

    /// Replace a document's contents wholesale, preserving `_id`. The
    /// replacement's own `_id`, if present, must equal `id` or be absent —
    /// a mismatched `_id` is rejected rather than silently discarded.
    pub fn replace_by_id(&mut self, id: &str, mut replacement: Value) -> Result<Document> {
        if !self.documents.contains_key(id) {
            return Err(VaultError::NotFound(format!("no document with _id {id:?}")));
        }
        match replacement.as_object_mut() {
            Some(obj) => {
                if let Some(supplied) = obj.get("_id") {
                    if supplied.as_str() != Some(id) {
                        return Err(VaultError::InvalidArgument(format!(
                            "replacement _id {supplied:?} does not match target _id {id:?}"
                        )));
                    }
                }
                obj.insert("_id".to_string(), Value::String(id.to_string()));
            }
            None => return Err(VaultError::InvalidDocument("replacement must be a JSON object".to_string())),
        }
        let document = Document::from_value(replacement)?;
        self.documents.insert(id.to_string(), document.clone());
        Ok(document)
    }

    pub fn update_by_id_with_operators(&mut self, id: &str, update_doc: &Value) -> Result<UpdateResult> {
        match self.documents.get(id) {
            None => Ok(UpdateResult { matched: 0, modified: 0 }),
            Some(existing) => {
                let updated = update::apply(existing, update_doc)?;
                let modified = updated.as_value() != existing.as_value();
                self.documents.insert(id.to_string(), updated);
                Ok(UpdateResult { matched: 1, modified: modified as usize })
            }
        }
    }

    pub fn update_all_by_filter(&mut self, filter: &Value, update_doc: &Value) -> Result<UpdateResult> {
        let ids: Vec<String> = self
            .documents
            .values()
            .filter_map(|d| match matches_filter(d, filter, 0) {
                Ok(true) => Some(Ok(d.id().to_string())),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = UpdateResult::default();
        for id in ids {
            let one = self.update_by_id_with_operators(&id, update_doc)?;
            result.matched += one.matched;
            result.modified += one.modified;
        }
        Ok(result)
    }

    pub fn delete_by_id(&mut self, id: &str) -> Option<Document> {
        self.documents.remove(id)
    }

    pub fn delete_by_filter(&mut self, filter: &Value) -> Result<usize> {
        let ids: Vec<String> = self
            .find_all_by_filter(filter)?
            .into_iter()
            .map(|d| d.id().to_string())
            .collect();
        for id in &ids {
            self.documents.remove(id);
        }
        Ok(ids.len())
    }
}
