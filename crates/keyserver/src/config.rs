//! Configuration loading and validation for the key server.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Which [`crate::keystore::KeyStore`] backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// Durable SQLite file at [`Config::database_path`].
    Sqlite,
    /// Process-local map; keys vanish on restart.
    Memory,
}

/// Validated key server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// YAML file mapping principal name to secret. **Required.**
    pub credentials_file: PathBuf,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Key store backend: `sqlite` or `memory`.
    #[serde(default = "default_key_store")]
    pub key_store: KeyStoreBackend,

    /// SQLite database file holding the `user_keys` table.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Root directory for uploaded ciphertext, one subdirectory per principal.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OTLP endpoint for span export. Logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    5000
}
fn default_key_store() -> KeyStoreBackend {
    KeyStoreBackend::Sqlite
}
fn default_database_path() -> PathBuf {
    PathBuf::from("keys.db")
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty_path(&self.credentials_file, "CREDENTIALS_FILE")?;
        ensure_non_empty_path(&self.upload_dir, "UPLOAD_DIR")?;
        if self.key_store == KeyStoreBackend::Sqlite {
            ensure_non_empty_path(&self.database_path, "DATABASE_PATH")?;
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must not be blank when set");
            }
        }
        Ok(())
    }
}

fn ensure_non_empty_path(value: &std::path::Path, name: &str) -> Result<()> {
    if value.as_os_str().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
