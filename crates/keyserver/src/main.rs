//! `keyserver` — binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP spans).
//! 3. Load the credential registry.
//! 4. Open the key store and the upload area.
//! 5. Build the Axum router and start the HTTP server.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use keyserver::auth::CredentialRegistry;
use keyserver::config::Config;
use keyserver::server::{router, state::AppState};
use keyserver::uploads::UploadStore;
use keyserver::{keystore, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        key_store = ?cfg.key_store,
        "keyserver starting"
    );

    // -----------------------------------------------------------------------
    // 3. Credentials
    // -----------------------------------------------------------------------
    let credentials = CredentialRegistry::load(&cfg.credentials_file)?;
    if credentials.is_empty() {
        anyhow::bail!("credentials file defines no principals");
    }
    info!(principals = credentials.len(), "credential registry loaded");

    // -----------------------------------------------------------------------
    // 4. Key store + upload area
    // -----------------------------------------------------------------------
    let key_store = keystore::open(&cfg).context("failed to open key store")?;
    tokio::fs::create_dir_all(&cfg.upload_dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", cfg.upload_dir.display()))?;
    let uploads = UploadStore::new(cfg.upload_dir.clone());

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(credentials, key_store, uploads);
    let app = router::build(
        state,
        router::Limits {
            max_body_bytes: cfg.max_upload_bytes,
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        },
    );

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("keyserver stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
