// vaultdb-core/src/lib.rs
// Pure Rust document database engine over a pluggable blob-store backend.

// Allow clippy lints that are too strict for this codebase
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::only_used_in_recursion)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::ptr_arg)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::nonminimal_bool)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::redundant_comparisons)]
#![allow(clippy::result_large_err)]
// Tests may have helper functions not used in all test cases
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

pub mod backend;
pub mod collection;
pub mod collection_metadata;
pub mod config;
pub mod database;
pub mod document;
pub mod document_ops;
pub mod error;
pub mod field_path;
pub mod file_service;
pub mod lock_service;
pub mod logging;
pub mod master_index;
pub mod object_utils;
pub mod query;
pub mod update;

// Public exports
pub use backend::{BlobStore, PropertyStore};
pub use collection::Collection;
pub use collection_metadata::CollectionMetadata;
pub use config::DatabaseConfig;
pub use database::Database;
pub use document::Document;
pub use document_ops::{DocumentOperations, UpdateResult};
pub use error::{Result, VaultError};
pub use field_path::FieldPath;
pub use lock_service::LockService;
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use master_index::{ConflictStrategy, LockEntry, MasterIndex, MasterIndexData};
pub use query::Query;
