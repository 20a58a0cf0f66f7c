// src/config.rs
//! Tunables for a `Database` instance.

use crate::master_index::ConflictStrategy;

/// Configuration passed to `Database::open`.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Property-store key under which the master index is stored.
    pub master_index_key: String,
    /// Default lock acquisition timeout, in milliseconds.
    pub default_lock_timeout_ms: u64,
    /// Minimum lock acquisition timeout; smaller requests are clamped up
    /// (with a warning) rather than rejected.
    pub min_lock_timeout_ms: u64,
    /// Consecutive backend failures before `FileService`'s circuit breaker
    /// trips and starts fast-failing with `BackendUnavailable`.
    pub circuit_breaker_threshold: u32,
    /// How long the circuit stays open before the next call is allowed to
    /// probe the backend again.
    pub circuit_breaker_cooloff_ms: u64,
    /// How a publish whose expected modification token no longer matches
    /// the property store's record is resolved.
    pub conflict_strategy: ConflictStrategy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            master_index_key: "VAULTDB_MASTER_INDEX".to_string(),
            default_lock_timeout_ms: 30_000,
            min_lock_timeout_ms: 1_000,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooloff_ms: 5_000,
            conflict_strategy: ConflictStrategy::Abort,
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_master_index_key(mut self, key: impl Into<String>) -> Self {
        self.master_index_key = key.into();
        self
    }

    pub fn with_default_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.default_lock_timeout_ms = ms;
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }
}
