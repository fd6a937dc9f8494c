//! [`MemoryKeyStore`]: process-local key store with lock-free reads.
//!
//! The whole map is swapped atomically via `arc-swap`, so readers never
//! block and never see a half-updated record. Keys are lost on restart.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use common::SymmetricKey;

use super::{KeyRecord, KeyStore, KeyStoreError};

#[derive(Debug)]
pub struct MemoryKeyStore {
    inner: ArcSwap<HashMap<String, KeyRecord>>,
}

impl MemoryKeyStore {
    /// Create a new, empty [`MemoryKeyStore`].
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn upsert(
        &self,
        principal: &str,
        key: &SymmetricKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(), KeyStoreError> {
        let record = KeyRecord {
            principal: principal.to_owned(),
            key: key.clone(),
            issued_at,
        };
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(principal.to_owned(), record.clone());
            next
        });
        Ok(())
    }

    fn lookup(&self, principal: &str) -> Result<Option<KeyRecord>, KeyStoreError> {
        Ok(self.inner.load().get(principal).cloned())
    }

    fn count(&self) -> Result<usize, KeyStoreError> {
        Ok(self.inner.load().len())
    }
}
