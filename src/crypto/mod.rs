//! Cryptographic building blocks for OtpVault.
//!
//! - AES-256-GCM sealing with associated data (`encryption`)
//! - Argon2id password hashing and key wrapping derivation (`kdf`)
//! - The zeroizing data key and HKDF per-entry keys (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

pub use encryption::{open, seal};
pub use kdf::{derive_wrapping_key, generate_salt, hash_password, verify_password, Argon2Params};
pub use keys::DataKey;
