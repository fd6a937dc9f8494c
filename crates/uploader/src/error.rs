//! Client-side error taxonomy.

use std::path::PathBuf;

use common::CryptoError;
use thiserror::Error;

/// Errors produced by the uploader.
///
/// Transport failures (including timeouts) are reported per operation and
/// are never retried here; callers decide whether to run again.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The key endpoint did not hand out a usable key.
    #[error("key request failed: {0}")]
    KeyRequestFailed(String),

    /// The store endpoint did not accept an encrypted file.
    #[error("upload of {file} failed: {reason}")]
    UploadFailed { file: String, reason: String },

    /// The decrypt endpoint did not return plaintext.
    #[error("decrypt request failed: {0}")]
    DecryptRequestFailed(String),

    /// A local file could not be read or written.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local encryption or decryption failed.
    #[error("{} could not be processed: {source}", path.display())]
    Crypto {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },

    /// The client could not be set up from the given settings.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl TransferError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Render a transport error, calling out timeouts explicitly.
pub(crate) fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".into()
    } else if e.is_connect() {
        format!("could not connect: {e}")
    } else {
        e.to_string()
    }
}
