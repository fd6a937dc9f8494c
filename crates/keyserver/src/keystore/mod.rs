//! [`KeyStore`]: one current symmetric key per principal.
//!
//! # Contract
//!
//! - [`KeyStore::upsert`] creates or replaces the principal's record in a
//!   single atomic commit. A concurrent [`KeyStore::lookup`] sees either the
//!   whole previous record or the whole new one.
//! - [`KeyStore::lookup`] returns `Ok(None)` when no key was ever issued. That
//!   is an expected condition, kept apart from [`KeyStoreError`].
//! - There is no listing. [`KeyStore::count`] exists for the status endpoint.
//!
//! Key bytes never appear in errors or log fields emitted from this module.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKeyStore;
pub use sqlite::SqliteKeyStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::SymmetricKey;
use thiserror::Error;

use crate::config::{Config, KeyStoreBackend};

/// Errors produced by a key store backend.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// The backend could not be reached (lock poisoned, file unopenable).
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    /// The database rejected a statement.
    #[error("key store query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a [`KeyRecord`].
    #[error("stored key record for principal {principal} is corrupt")]
    Corrupt { principal: String },
}

/// The persisted binding of a principal to its current key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub principal: String,
    pub key: SymmetricKey,
    pub issued_at: DateTime<Utc>,
}

/// Storage for [`KeyRecord`]s. Implementations are blocking; async callers go
/// through `tokio::task::spawn_blocking`.
#[cfg_attr(test, mockall::automock)]
pub trait KeyStore: Send + Sync {
    /// Create or overwrite the record for `principal`.
    fn upsert(
        &self,
        principal: &str,
        key: &SymmetricKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(), KeyStoreError>;

    /// Fetch the current record for `principal`, if any.
    fn lookup(&self, principal: &str) -> Result<Option<KeyRecord>, KeyStoreError>;

    /// Number of principals holding an issued key.
    fn count(&self) -> Result<usize, KeyStoreError>;
}

/// Open the backend selected by `cfg.key_store`.
///
/// # Errors
///
/// Returns [`KeyStoreError`] if the SQLite file cannot be opened or its
/// schema cannot be created.
pub fn open(cfg: &Config) -> Result<Arc<dyn KeyStore>, KeyStoreError> {
    match cfg.key_store {
        KeyStoreBackend::Sqlite => Ok(Arc::new(SqliteKeyStore::open(&cfg.database_path)?)),
        KeyStoreBackend::Memory => Ok(Arc::new(MemoryKeyStore::new())),
    }
}
