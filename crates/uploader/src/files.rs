//! Local file handling: discovery, naming, and local encrypt/decrypt.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use common::SymmetricKey;
use tokio::fs;
use tracing::warn;

use crate::error::TransferError;

/// Suffix appended to encrypted output files.
pub const ENCRYPTED_SUFFIX: &str = ".enc";
/// Suffix appended to locally decrypted output files.
pub const DECRYPTED_SUFFIX: &str = ".dec";

/// List files directly inside `dir` whose extension is in `extensions`.
///
/// Matching is ASCII case-insensitive. Symlinks are followed; subdirectories
/// are not descended into. An entry whose metadata cannot be read is kept,
/// so the batch reports it as a failed file instead of dropping it. The
/// result is sorted so batch order is stable.
pub async fn find_model_files(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, TransferError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| TransferError::io("read directory", dir, e))?;

    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| TransferError::io("read directory", dir, e))?
    {
        let path = entry.path();
        if !has_extension(&path, extensions) {
            continue;
        }
        match fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => continue,
            Ok(_) => found.push(path),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot stat model file");
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

/// `model.h5` → `model.h5.enc`.
pub fn encrypted_path(path: &Path) -> PathBuf {
    append_suffix(path, ENCRYPTED_SUFFIX)
}

/// `model.h5.enc` → `model.h5.dec`; any other name just gains `.dec`.
pub fn decrypted_path(path: &Path) -> PathBuf {
    let stripped = path
        .to_str()
        .and_then(|s| s.strip_suffix(ENCRYPTED_SUFFIX))
        .filter(|s| !s.is_empty() && !s.ends_with(std::path::MAIN_SEPARATOR))
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf());
    append_suffix(&stripped, DECRYPTED_SUFFIX)
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Final path component as UTF-8, used as the upload filename.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Encrypt `source` under `key`, write the blob beside it, and return it.
///
/// On any failure the `.enc` output is not left behind half-written.
pub async fn encrypt_file(
    source: &Path,
    key: &SymmetricKey,
) -> Result<(PathBuf, Vec<u8>), TransferError> {
    let plaintext = fs::read(source)
        .await
        .map_err(|e| TransferError::io("read", source, e))?;

    let key = key.clone();
    let blob =
        tokio::task::spawn_blocking(move || common::crypto::encrypt(key.as_bytes(), &plaintext))
            .await
            .map_err(|e| TransferError::io("encrypt", source, std::io::Error::other(e)))?
            .map_err(|e| TransferError::Crypto {
                path: source.to_path_buf(),
                source: e,
            })?;

    let dest = encrypted_path(source);
    if let Err(e) = fs::write(&dest, &blob).await {
        let _ = fs::remove_file(&dest).await;
        return Err(TransferError::io("write", dest, e));
    }
    Ok((dest, blob))
}

/// Decrypt a local `.enc` file under `key` and write the plaintext beside it.
pub async fn decrypt_file(source: &Path, key: &SymmetricKey) -> Result<PathBuf, TransferError> {
    let blob = fs::read(source)
        .await
        .map_err(|e| TransferError::io("read", source, e))?;

    let plaintext = common::crypto::decrypt(key.as_bytes(), &blob).map_err(|e| {
        TransferError::Crypto {
            path: source.to_path_buf(),
            source: e,
        }
    })?;

    let dest = decrypted_path(source);
    fs::write(&dest, &plaintext)
        .await
        .map_err(|e| TransferError::io("write", &dest, e))?;
    Ok(dest)
}
