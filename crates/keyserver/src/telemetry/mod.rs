//! Tracing setup: structured JSON logs, plus OTLP span export when an
//! endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - **No key material or secrets** may appear in any span attribute or log
//!   field. Principal names are fine.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init_telemetry;
