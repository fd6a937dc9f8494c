//! [`KeyIssuer`]: fresh key generation bound to a principal.
//!
//! Every call draws a new key from the OS CSPRNG; nothing is derived from the
//! principal's previous key. Committing the new record overwrites the old one,
//! so blobs sealed under the old key stop decrypting server-side.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use common::SymmetricKey;
use thiserror::Error;
use tracing::{info, warn};

use crate::keystore::{KeyRecord, KeyStore, KeyStoreError};

/// Errors produced by key issuance.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The store rejected the write; no key was issued.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] KeyStoreError),
}

#[derive(Clone)]
pub struct KeyIssuer {
    store: Arc<dyn KeyStore>,
}

impl KeyIssuer {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Generate, commit and return a new key for `principal`.
    ///
    /// Blocking: call from `spawn_blocking` on the async path.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::StorageUnavailable`] if the store write fails.
    /// The generated key is dropped (and zeroized) in that case.
    pub fn issue(&self, principal: &str) -> Result<KeyRecord, IssueError> {
        let key = SymmetricKey::generate();
        // Stored timestamps keep microsecond precision.
        let issued_at = Utc::now().trunc_subsecs(6);

        if let Err(e) = self.store.upsert(principal, &key, issued_at) {
            warn!(principal, error = %e, "key issuance aborted: store write failed");
            return Err(e.into());
        }

        info!(principal, issued_at = %issued_at, "issued new key");
        Ok(KeyRecord {
            principal: principal.to_owned(),
            key,
            issued_at,
        })
    }
}

impl std::fmt::Debug for KeyIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIssuer").finish_non_exhaustive()
    }
}
