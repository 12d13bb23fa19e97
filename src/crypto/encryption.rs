//! AES-256-GCM authenticated encryption.
//!
//! Every call to `seal` draws a fresh 12-byte nonce and prepends it to
//! the output, so a sealed blob is self-contained:
//!
//! ```text
//! [ 12-byte nonce | ciphertext + 16-byte tag ]
//! ```
//!
//! Entries are sealed with their id as associated data, which stops a
//! ciphertext from being swapped onto another entry in the store file.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{OtpVaultError, Result};

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte `key`, binding `aad` to it.
pub fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| OtpVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| OtpVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by `seal` with the same `key` and `aad`.
pub fn open(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(OtpVaultError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| OtpVaultError::DecryptionFailed)?;

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| OtpVaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open() {
        let key = [7u8; 32];
        let sealed = seal(&key, b"JBSWY3DPEHPK3PXP", b"entry-1").unwrap();
        assert_eq!(open(&key, &sealed, b"entry-1").unwrap(), b"JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn open_rejects_other_aad() {
        let key = [7u8; 32];
        let sealed = seal(&key, b"payload", b"entry-1").unwrap();
        assert!(open(&key, &sealed, b"entry-2").is_err());
    }

    #[test]
    fn open_rejects_wrong_key() {
        let sealed = seal(&[1u8; 32], b"payload", b"").unwrap();
        assert!(open(&[2u8; 32], &sealed, b"").is_err());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let key = [9u8; 32];
        let a = seal(&key, b"same", b"").unwrap();
        let b = seal(&key, b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(open(&[0u8; 32], &[0u8; 4], b"").is_err());
    }
}
