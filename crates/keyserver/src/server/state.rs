//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::auth::CredentialRegistry;
use crate::issuer::KeyIssuer;
use crate::keystore::KeyStore;
use crate::uploads::UploadStore;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Immutable principal registry checked by the auth guard.
    pub credentials: Arc<CredentialRegistry>,
    /// Current key per principal; the only state shared between requests.
    pub key_store: Arc<dyn KeyStore>,
    /// Generates and commits keys into `key_store`.
    pub issuer: KeyIssuer,
    /// Destination for uploaded ciphertext.
    pub uploads: UploadStore,
}

impl AppState {
    /// Create a new [`AppState`]; the issuer writes into `key_store`.
    pub fn new(
        credentials: CredentialRegistry,
        key_store: Arc<dyn KeyStore>,
        uploads: UploadStore,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            issuer: KeyIssuer::new(Arc::clone(&key_store)),
            key_store,
            uploads,
        }
    }
}
