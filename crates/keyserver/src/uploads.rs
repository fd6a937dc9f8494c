//! Verbatim storage of uploaded ciphertext under `<root>/<principal>/<filename>`.
//!
//! The server never interprets upload contents. Each write goes to a uniquely
//! named temp file in the destination directory and is renamed into place,
//! so concurrent uploads of the same name never interleave bytes.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

use crate::auth::Principal;

#[derive(Debug, Error)]
pub enum UploadError {
    /// The payload or filename is unusable.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to persist upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful [`UploadStore::save`].
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Path relative to the upload root.
    pub relative_path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist `data` for `principal` under the final component of `filename`.
    ///
    /// # Errors
    ///
    /// [`UploadError::Rejected`] for an empty payload or unusable filename,
    /// [`UploadError::Io`] if the filesystem write fails.
    pub async fn save(
        &self,
        principal: &Principal,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadError> {
        if data.is_empty() {
            return Err(UploadError::Rejected("uploaded file is empty".into()));
        }
        let name = sanitize_filename(filename)
            .ok_or_else(|| UploadError::Rejected("no file selected".into()))?;

        let dir = self.root.join(principal.as_str());
        fs::create_dir_all(&dir).await?;

        let dest = dir.join(&name);
        let tmp = dir.join(format!(".{name}.{}.part", uuid::Uuid::new_v4()));

        let written = write_then_rename(&tmp, &dest, &data).await;
        if written.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        written?;

        let relative_path = format!("{}/{name}", principal.as_str());
        info!(principal = %principal, path = %relative_path, bytes = data.len(), "upload stored");
        Ok(StoredUpload {
            relative_path,
            bytes: data.len() as u64,
        })
    }
}

async fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, dest).await
}

/// Reduce a client-supplied filename to a bare final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// remains.
fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(last.to_owned())
}
