//! Vault module — the encrypted secret store.
//!
//! This module provides:
//! - `Secret`, `StoredSecret` and `SecretSummary` types (`secret`)
//! - The JSON store document with versioned migration (`format`)
//! - Password policy for new passwords (`policy`)
//! - High-level `SecretStore` with the unlock/lock lifecycle (`store`)

pub mod format;
pub mod policy;
pub mod secret;
pub mod store;

// Re-export the most commonly used items.
pub use format::{SecurityConfig, StoreDocument};
pub use secret::{Algorithm, OtpType, Secret, SecretSummary, StoredSecret};
pub use store::{SecretStore, StoreState};
