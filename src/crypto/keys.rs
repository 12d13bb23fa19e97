//! The data key and the per-entry keys derived from it.
//!
//! One random 32-byte data key encrypts every entry in the store. Each
//! entry gets its own sub-key through HKDF-SHA256 with
//! `info = "otpvault-entry:<id>"`, so two entries never share a key.
//!
//! The data key itself is either wrapped under a password-derived key or,
//! when password protection is disabled, stored as-is.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroize;

use super::encryption;
use super::kdf::KEY_LEN;
use crate::errors::{OtpVaultError, Result};

/// The decrypted symmetric key held while the store is unlocked.
///
/// Zeroed on drop. Deliberately not `Clone`: the only copy lives in the
/// store's session slot.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DataKey {
    bytes: [u8; KEY_LEN],
}

impl DataKey {
    /// Generate a fresh random data key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from raw bytes, rejecting the wrong length.
    ///
    /// The input slice is not zeroed here; callers own that.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|_| {
            OtpVaultError::KeyDerivationFailed(format!(
                "data key must be {KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the encryption key for a single entry.
    pub fn entry_key(&self, id: &Uuid) -> Result<[u8; KEY_LEN]> {
        let info = format!("otpvault-entry:{id}");
        let hk = Hkdf::<Sha256>::new(None, &self.bytes);

        let mut okm = [0u8; KEY_LEN];
        hk.expand(info.as_bytes(), &mut okm)
            .map_err(|e| OtpVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
        Ok(okm)
    }

    /// Encrypt this key under a password-derived wrapping key.
    pub fn wrap(&self, wrapping_key: &[u8]) -> Result<Vec<u8>> {
        encryption::seal(wrapping_key, &self.bytes, b"otpvault-data-key")
    }

    /// Recover a data key from its wrapped form.
    pub fn unwrap(wrapping_key: &[u8], wrapped: &[u8]) -> Result<Self> {
        let mut raw = encryption::open(wrapping_key, wrapped, b"otpvault-data-key")?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}
