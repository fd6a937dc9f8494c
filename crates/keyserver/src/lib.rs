//! `keyserver` — per-principal key issuance, ciphertext upload storage and
//! server-side decryption behind HTTP Basic authentication.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! and the `uploader` end-to-end suite build the router directly through
//! [`server::router::build`].

pub mod auth;
pub mod config;
pub mod issuer;
pub mod keystore;
pub mod server;
pub mod telemetry;
pub mod uploads;
