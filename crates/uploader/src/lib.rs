//! Client side of the key service: fetch a key, encrypt model files locally,
//! upload the ciphertext, and decrypt it again either offline or via the server.

pub mod api;
pub mod config;
pub mod error;
pub mod files;
pub mod telemetry;
pub mod transfer;

pub use api::ApiClient;
pub use error::TransferError;
pub use transfer::{encrypt_and_upload_dir, fetch_decrypted, BatchReport};
