// src/error.rs
//! Error taxonomy for VaultDB
//!
//! One variant per kind in the specification's error table. Validation
//! errors are raised before any backend state is touched; backend errors
//! are raised only after an in-memory rollback has already happened for the
//! current call (callers never observe partial mutation).

use thiserror::Error;

/// Result alias used throughout `vaultdb-core`.
pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("duplicate key: _id {0:?} already exists")]
    DuplicateKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("_id is immutable")]
    ImmutableField,

    #[error("lock acquisition timed out after {0}ms")]
    LockTimeout(u64),

    #[error("modification conflict on collection {collection:?}: expected token {expected:?}, actual {actual:?}")]
    Conflict {
        collection: String,
        expected: String,
        actual: String,
    },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::InvalidDocument(format!("malformed JSON: {e}"))
    }
}
