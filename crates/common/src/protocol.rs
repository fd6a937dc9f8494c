//! Request and response types exchanged between the uploader and the key server.
//!
//! All bodies are JSON except the decrypt endpoint's success response, which is
//! the raw plaintext as `application/octet-stream`.

use serde::{Deserialize, Serialize};

/// Path of the key-issuance endpoint.
pub const GET_KEY_PATH: &str = "/get-key";
/// Path of the ciphertext upload endpoint.
pub const UPLOAD_PATH: &str = "/upload-model";
/// Path of the server-side decrypt endpoint.
pub const DECRYPT_PATH: &str = "/decrypt";
/// Path of the unauthenticated status endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Multipart field name carrying file content on upload and decrypt.
pub const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Key issuance
// ---------------------------------------------------------------------------

/// Successful response body for `GET /get-key`.
///
/// `key` is the freshly issued 256-bit key, URL-safe base64 with padding.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyResponse {
    pub key: String,
}

impl std::fmt::Debug for KeyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResponse")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Successful response body for `POST /upload-model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// Storage path relative to the server's upload area (`<principal>/<filename>`).
    pub path: String,
    /// Number of bytes persisted.
    pub bytes: u64,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"no_key_for_principal"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(e: &crate::ServiceError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the key store answered the readiness probe.
    pub store_ready: bool,
    /// Number of principals that currently hold an issued key.
    pub keys_issued: usize,
}
