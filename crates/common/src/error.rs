//! Service-level error taxonomy shared across crates.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::AuthenticationFailed`] → 401
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::NoKeyForPrincipal`] → 404
/// - [`ServiceError::PayloadTooLarge`] → 413
/// - [`ServiceError::DecryptionFailed`] → 422
/// - [`ServiceError::InvalidKey`] → 500
/// - [`ServiceError::StorageUnavailable`] → 503
/// - [`ServiceError::Internal`] → 500
///
/// Messages are fixed strings or caller-supplied context. Key material never
/// appears in any variant.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credentials were missing or did not match a known principal.
    #[error("authentication required")]
    AuthenticationFailed,

    /// The request was malformed, e.g. a missing file part or empty payload.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No key has ever been issued for the authenticated principal.
    #[error("no key has been issued for this principal")]
    NoKeyForPrincipal,

    /// The request body exceeded the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The ciphertext did not authenticate under the principal's current key.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Key material held by the service is malformed.
    #[error("stored key material is invalid")]
    InvalidKey,

    /// The key store could not be reached or returned an error.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::AuthenticationFailed => 401,
            ServiceError::BadRequest(_) => 400,
            ServiceError::NoKeyForPrincipal => 404,
            ServiceError::PayloadTooLarge(_) => 413,
            ServiceError::DecryptionFailed => 422,
            ServiceError::InvalidKey => 500,
            ServiceError::StorageUnavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::AuthenticationFailed => "authentication_failed",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::NoKeyForPrincipal => "no_key_for_principal",
            ServiceError::PayloadTooLarge(_) => "payload_too_large",
            ServiceError::DecryptionFailed => "decryption_failed",
            ServiceError::InvalidKey => "invalid_key",
            ServiceError::StorageUnavailable(_) => "storage_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<CryptoError> for ServiceError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey => ServiceError::InvalidKey,
            CryptoError::DecryptionFailed => ServiceError::DecryptionFailed,
            CryptoError::EncryptionFailed => ServiceError::Internal("encryption failed".into()),
        }
    }
}
