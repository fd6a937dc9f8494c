//! Batch workflows built on [`ApiClient`] and the local file helpers.
//!
//! A batch fetches one key, then handles each model file independently: a
//! failure on one file is recorded and the batch moves on to the next.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::TransferError;
use crate::files;

/// A model file that was encrypted and accepted by the server.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub source: PathBuf,
    pub encrypted: PathBuf,
    /// Server-side path, relative to its upload area.
    pub remote_path: String,
}

/// A model file that could not be processed.
#[derive(Debug)]
pub struct FileFailure {
    pub source: PathBuf,
    pub error: TransferError,
}

/// Outcome of [`encrypt_and_upload_dir`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: Vec<UploadedFile>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Encrypt every model file in `dir` under a freshly issued key and upload it.
///
/// The directory is listed before any request is made, so an empty directory
/// costs no key rotation.
///
/// # Errors
///
/// Returns an error only when the batch cannot start: the directory is
/// unreadable or the key request fails. Per-file problems are collected in
/// [`BatchReport::failures`].
pub async fn encrypt_and_upload_dir(
    client: &ApiClient,
    dir: &Path,
    extensions: &[String],
) -> Result<BatchReport, TransferError> {
    let sources = files::find_model_files(dir, extensions).await?;
    if sources.is_empty() {
        info!(dir = %dir.display(), "no model files found; nothing to upload");
        return Ok(BatchReport::default());
    }

    let key = client.fetch_key().await?;
    info!(files = sources.len(), "obtained key; encrypting batch");

    let mut report = BatchReport::default();
    for source in sources {
        match upload_one(client, &source, &key).await {
            Ok(uploaded) => {
                info!(
                    file = %source.display(),
                    remote = %uploaded.remote_path,
                    "encrypted and uploaded"
                );
                report.uploaded.push(uploaded);
            }
            Err(error) => {
                warn!(file = %source.display(), error = %error, "skipping file");
                report.failures.push(FileFailure { source, error });
            }
        }
    }
    Ok(report)
}

async fn upload_one(
    client: &ApiClient,
    source: &Path,
    key: &common::SymmetricKey,
) -> Result<UploadedFile, TransferError> {
    let (encrypted, blob) = files::encrypt_file(source, key).await?;
    let response = client.upload(&files::file_name(&encrypted), blob).await?;
    Ok(UploadedFile {
        source: source.to_path_buf(),
        encrypted,
        remote_path: response.path,
    })
}

/// Send a local ciphertext to the server for decryption and write the result.
///
/// Succeeds only if the server still holds the key the blob was sealed under.
pub async fn fetch_decrypted(
    client: &ApiClient,
    encrypted: &Path,
) -> Result<PathBuf, TransferError> {
    let blob = tokio::fs::read(encrypted)
        .await
        .map_err(|e| TransferError::io("read", encrypted, e))?;

    let plaintext = client
        .decrypt_remote(&files::file_name(encrypted), blob)
        .await?;

    let dest = files::decrypted_path(encrypted);
    tokio::fs::write(&dest, &plaintext)
        .await
        .map_err(|e| TransferError::io("write", &dest, e))?;
    info!(file = %encrypted.display(), output = %dest.display(), "server decrypted file");
    Ok(dest)
}
