//! Common types, protocol definitions, key material, and the file cipher shared
//! by the `keyserver` and `uploader` crates.

pub mod crypto;
pub mod error;
pub mod key;
pub mod protocol;

pub use crypto::CryptoError;
pub use error::ServiceError;
pub use key::SymmetricKey;
