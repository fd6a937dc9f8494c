//! AES-256-GCM-SIV encryption and decryption of whole-file payloads.
//!
//! # Blob format
//!
//! ```text
//! 0x01 || nonce (12 bytes) || ciphertext + tag (16 bytes)
//! ```
//!
//! The leading version byte is bound as associated data, so rewriting it
//! fails authentication like any other tampering. A fresh random nonce is
//! drawn for every call, so encrypting the same file twice under the same key
//! yields unrelated blobs.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag.
pub const TAG_LEN: usize = 16;

/// Format version written as the first byte of every blob.
pub const FORMAT_VERSION: u8 = 0x01;

/// Shortest blob that can possibly authenticate (empty plaintext).
pub const MIN_BLOB_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

/// Errors produced by the cipher layer.
///
/// None of the variants carry library internals or key bytes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The key is not exactly [`KEY_LEN`] bytes.
    #[error("invalid key: expected {KEY_LEN} bytes")]
    InvalidKey,

    /// Authentication failed: wrong key, tampered or truncated ciphertext.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The AEAD refused to encrypt (unreachable with a valid key).
    #[error("encryption failed")]
    EncryptionFailed,
}

/// Encrypt `plaintext` under `key`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if `key` is not [`KEY_LEN`] bytes.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &[FORMAT_VERSION],
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Either the full plaintext is returned or nothing is.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CryptoError::DecryptionFailed`] if the blob is truncated, carries
/// an unknown version byte, or fails authentication.
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(key)?;

    if blob.len() < MIN_BLOB_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (version, rest) = blob.split_at(1);
    let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: sealed,
                aad: version,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKey);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)
}
