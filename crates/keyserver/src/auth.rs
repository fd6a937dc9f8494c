//! Immutable principal → secret registry resolved once at startup.
//!
//! Secrets are not kept in memory as plaintext. Each one is replaced by an
//! HMAC-SHA256 tag under a random per-process pepper, and verification
//! compares tags with [`Mac::verify_slice`], which runs in constant time.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::SymmetricKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// An authenticated principal name, inserted into request extensions by the
/// auth guard and consumed by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credentials presented by a caller.
pub struct Credentials {
    pub principal: String,
    pub secret: Zeroizing<String>,
}

impl Credentials {
    /// Parse the value of an `Authorization: Basic ...` header.
    ///
    /// Returns `None` for any other scheme or malformed payload.
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).ok()?);
        let text = std::str::from_utf8(&decoded).ok()?;
        let (principal, secret) = text.split_once(':')?;
        Some(Self {
            principal: principal.to_owned(),
            secret: Zeroizing::new(secret.to_owned()),
        })
    }
}

/// Known principals and their peppered secret tags.
pub struct CredentialRegistry {
    pepper: SymmetricKey,
    tags: HashMap<String, Vec<u8>>,
    /// Checked in place of a real tag for unknown principals.
    decoy: Vec<u8>,
}

impl CredentialRegistry {
    /// Build a registry from plaintext `principal → secret` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a principal name is unusable as a storage
    /// directory name or if a secret is empty.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pepper = SymmetricKey::generate();

        let mut tags = HashMap::new();
        for (principal, secret) in entries {
            let secret = Zeroizing::new(secret);
            validate_principal(&principal)?;
            if secret.is_empty() {
                anyhow::bail!("principal {principal} has an empty secret");
            }
            let tag = secret_tag(&pepper, &secret)?;
            tags.insert(principal, tag);
        }
        let decoy = secret_tag(&pepper, &SymmetricKey::generate().encode())?;
        Ok(Self {
            pepper,
            tags,
            decoy,
        })
    }

    /// Parse a YAML mapping of principal name to secret.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let entries: HashMap<String, String> =
            serde_yaml::from_str(text).context("credentials file is not a YAML string map")?;
        Self::new(entries)
    }

    /// Load the credentials file named by `CREDENTIALS_FILE`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read credentials file {}", path.display()))?,
        );
        Self::from_yaml(&text)
    }

    /// Number of configured principals.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Check presented credentials.
    ///
    /// Unknown principals and wrong secrets are indistinguishable to the
    /// caller: an unknown name still pays for one MAC and one comparison.
    pub fn verify(&self, creds: &Credentials) -> Option<Principal> {
        let known = self.tags.get(&creds.principal);
        let expected = known.unwrap_or(&self.decoy);
        let mut mac = HmacSha256::new_from_slice(self.pepper.as_bytes()).ok()?;
        mac.update(creds.secret.as_bytes());
        let matched = mac.verify_slice(expected).is_ok();
        (matched && known.is_some()).then(|| Principal::new(creds.principal.clone()))
    }
}

impl std::fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("principals", &self.tags.len())
            .finish()
    }
}

fn secret_tag(pepper: &SymmetricKey, secret: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes())
        .map_err(|_| anyhow::anyhow!("credential pepper rejected by HMAC"))?;
    mac.update(secret.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Principal names double as upload subdirectory names.
fn validate_principal(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !ok {
        anyhow::bail!("invalid principal name {name:?}: use ASCII letters, digits, '-', '_', '.', '@'");
    }
    Ok(())
}
