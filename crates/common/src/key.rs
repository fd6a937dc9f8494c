//! [`SymmetricKey`]: a 256-bit per-principal key that zeroizes on drop.

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{CryptoError, KEY_LEN};

/// Fixed-size key buffer holding exactly [`KEY_LEN`] bytes.
///
/// There is intentionally no `Display` impl and `Debug` is redacted, so the
/// key cannot end up in a log line or error message by accident.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Draw a fresh key from the OS CSPRNG.
    ///
    /// Every call is independent of every previous key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Copy key material out of a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(arr))
    }

    /// Decode the wire form produced by [`SymmetricKey::encode`].
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the text is not valid base64 or
    /// does not decode to exactly [`KEY_LEN`] bytes.
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let mut raw = URL_SAFE
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidKey)?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }

    /// Encode as URL-safe base64 with padding (44 characters).
    pub fn encode(&self) -> String {
        URL_SAFE.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SymmetricKey {}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_independent() {
        let a = SymmetricKey::generate();
        let b = SymmetricKey::generate();
        assert_ne!(a, b);
        assert_ne!(a.as_bytes(), &[0u8; KEY_LEN]);
    }

    #[test]
    fn encode_is_44_chars_and_decodes_back() {
        let key = SymmetricKey::generate();
        let text = key.encode();
        assert_eq!(text.len(), 44);
        assert_eq!(SymmetricKey::decode(&text).unwrap(), key);
    }

    #[test]
    fn decode_tolerates_trailing_newline() {
        let key = SymmetricKey::generate();
        let text = format!("{}\n", key.encode());
        assert_eq!(SymmetricKey::decode(&text).unwrap(), key);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let short = URL_SAFE.encode([7u8; 16]);
        assert!(matches!(
            SymmetricKey::decode(&short),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            SymmetricKey::decode("not base64 at all!"),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn debug_is_redacted() {
        let key = SymmetricKey::from_slice(&[0xAB; KEY_LEN]).unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }
}
