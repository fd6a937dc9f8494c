//! Configuration loading and validation for the uploader.
//!
//! Everything comes from the environment. Which variables are required
//! depends on the mode: network modes need the server address and
//! credentials, offline decryption needs only `SERVER_KEY`.

use std::time::Duration;

use anyhow::{Context, Result};
use common::SymmetricKey;
use serde::Deserialize;
use zeroize::Zeroizing;

/// Raw uploader configuration as read from the environment.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base URL of the key server, e.g. `http://keys.internal:5000`.
    #[serde(default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub server_username: Option<String>,

    #[serde(default)]
    pub server_password: Option<String>,

    /// Base64 key for offline `decrypt` mode.
    #[serde(default)]
    pub server_key: Option<String>,

    /// Comma-separated list of model file extensions, without dots.
    #[serde(default = "default_model_extensions")]
    pub model_extensions: String,

    /// Timeout applied to every request to the key server.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Validated settings for talking to the key server.
#[derive(Clone)]
pub struct RemoteConfig {
    pub server_url: String,
    pub username: String,
    pub password: Zeroizing<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("server_username", &self.server_username)
            .field("server_password", &self.server_password.as_ref().map(|_| "[REDACTED]"))
            .field("server_key", &self.server_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_extensions", &self.model_extensions)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn default_model_extensions() -> String {
    "h5,keras".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Mode-specific requirements are checked later by [`Config::remote`]
    /// and [`Config::offline_key`].
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build uploader configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise uploader configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.extensions().is_empty() {
            anyhow::bail!("MODEL_EXTENSIONS must name at least one extension");
        }
        Ok(())
    }

    /// Settings for the network modes.
    ///
    /// # Errors
    ///
    /// Fails if `SERVER_URL`, `SERVER_USERNAME` or `SERVER_PASSWORD` is unset or blank.
    pub fn remote(&self) -> Result<RemoteConfig> {
        let server_url = required(&self.server_url, "SERVER_URL")?;
        let username = required(&self.server_username, "SERVER_USERNAME")?;
        let password = required(&self.server_password, "SERVER_PASSWORD")?;
        Ok(RemoteConfig {
            server_url: server_url.trim().trim_end_matches('/').to_owned(),
            username: username.to_owned(),
            password: Zeroizing::new(password.to_owned()),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    /// The key for offline decryption.
    ///
    /// # Errors
    ///
    /// Fails if `SERVER_KEY` is unset or not a valid encoded key. The key
    /// value itself is never part of the message.
    pub fn offline_key(&self) -> Result<SymmetricKey> {
        let encoded = required(&self.server_key, "SERVER_KEY")?;
        SymmetricKey::decode(encoded)
            .map_err(|_| anyhow::anyhow!("SERVER_KEY is not a valid 32-byte base64 key"))
    }

    /// Normalised extension list: lowercase, no leading dots, no blanks.
    pub fn extensions(&self) -> Vec<String> {
        self.model_extensions
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => anyhow::bail!("{name} is required and must not be empty"),
    }
}
