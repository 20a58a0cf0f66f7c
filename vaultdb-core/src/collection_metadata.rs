// src/collection_metadata.rs
//! Per-collection bookkeeping: the blob's backend handle, timestamps,
//! document count, and a modification token that changes on every
//! persisted write, used by the master index to detect concurrent
//! writers stepping on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    pub file_handle: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub document_count: usize,
    pub modification_token: String,
}

impl CollectionMetadata {
    pub fn new(name: impl Into<String>, file_handle: impl Into<String>) -> Self {
        let now = Utc::now();
        CollectionMetadata {
            name: name.into(),
            file_handle: file_handle.into(),
            created: now,
            last_updated: now,
            document_count: 0,
            modification_token: Uuid::new_v4().to_string(),
        }
    }

    /// Bump `last_updated`, `document_count`, and mint a fresh
    /// modification token. Called exactly once per persisted mutation.
    pub fn mark_modified(&mut self, document_count: usize) {
        self.last_updated = Utc::now();
        self.document_count = document_count;
        self.modification_token = Uuid::new_v4().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_distinct_tokens() {
        let a = CollectionMetadata::new("people", "handle-1");
        let b = CollectionMetadata::new("people", "handle-2");
        assert_ne!(a.modification_token, b.modification_token);
    }

    #[test]
    fn mark_modified_rotates_token_and_updates_count() {
        let mut meta = CollectionMetadata::new("people", "handle-1");
        let original_token = meta.modification_token.clone();
        meta.mark_modified(5);
        assert_ne!(meta.modification_token, original_token);
        assert_eq!(meta.document_count, 5);
    }
}
