//! Password hashing and password-based key derivation using Argon2id.
//!
//! Two distinct uses of the same password:
//! - a PHC-format hash (`$argon2id$v=19$...`) stored in the security
//!   section and checked on unlock;
//! - a raw 32-byte wrapping key, derived with a separate salt, that
//!   encrypts the data key.
//!
//! Parameters come from `Settings` (or sensible defaults) and are stored
//! with the wrapped key so reopening uses the same cost.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{OtpVaultError, Result};

/// Length of a wrapping-key salt in bytes (256 bits).
const SALT_LEN: usize = 32;

/// Length of derived keys in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    fn build(&self, output_len: Option<usize>) -> Result<Argon2<'static>> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(OtpVaultError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(OtpVaultError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(OtpVaultError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }

        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, output_len)
            .map_err(|e| OtpVaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password into a PHC string suitable for storage.
pub fn hash_password(password: &[u8], params: &Argon2Params) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| OtpVaultError::KeyDerivationFailed(format!("salt encoding: {e}")))?;

    let argon2 = params.build(None)?;
    let hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| OtpVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// The cost parameters are read from the hash itself, so a hash made
/// with older settings still verifies. A malformed hash never verifies.
pub fn verify_password(password: &[u8], phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default().verify_password(password, &parsed).is_ok()
}

/// Derive a 32-byte key-wrapping key from a password and salt.
///
/// The same password + salt + params always produce the same key.
pub fn derive_wrapping_key(
    password: &[u8],
    salt: &[u8],
    params: &Argon2Params,
) -> Result<[u8; KEY_LEN]> {
    let argon2 = params.build(Some(KEY_LEN))?;

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| OtpVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
