//! One-time code generation: HOTP (RFC 4226) and TOTP (RFC 6238).
//!
//! Turns a stored `Secret` into the short numeric code shown to the user.
//! SHA-1, SHA-256 and SHA-512 are supported.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::errors::{OtpVaultError, Result};
use crate::vault::secret::{Algorithm, OtpType, Secret};

/// A code plus how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub code: String,
    /// Seconds until the next TOTP step; `None` for HOTP.
    pub remaining_secs: Option<u32>,
}

/// HOTP over raw key bytes.
pub fn hotp(key: &[u8], counter: u64, digits: u8, algorithm: Algorithm) -> Result<String> {
    if !(6..=8).contains(&digits) {
        return Err(OtpVaultError::InvalidSecret(format!(
            "digits must be between 6 and 8 (got {digits})"
        )));
    }
    let message = counter.to_be_bytes();
    let digest = match algorithm {
        Algorithm::Sha1 => hmac_digest::<Hmac<Sha1>>(key, &message)?,
        Algorithm::Sha256 => hmac_digest::<Hmac<Sha256>>(key, &message)?,
        Algorithm::Sha512 => hmac_digest::<Hmac<Sha512>>(key, &message)?,
    };
    Ok(truncate(&digest, digits))
}

/// TOTP over raw key bytes at an explicit unix time.
pub fn totp_at(
    key: &[u8],
    unix_secs: u64,
    period: u32,
    digits: u8,
    algorithm: Algorithm,
) -> Result<String> {
    if period == 0 {
        return Err(OtpVaultError::InvalidSecret("period must be positive".into()));
    }
    hotp(key, unix_secs / u64::from(period), digits, algorithm)
}

/// The code for `secret` at `unix_secs`.
pub fn code_at(secret: &Secret, unix_secs: u64) -> Result<Code> {
    let key = Zeroizing::new(secret.key_bytes()?);
    match secret.otp_type {
        OtpType::Totp => {
            let code = totp_at(&key, unix_secs, secret.period, secret.digits, secret.algorithm)?;
            let period = u64::from(secret.period);
            let remaining = (period - unix_secs % period) as u32;
            Ok(Code {
                code,
                remaining_secs: Some(remaining),
            })
        }
        OtpType::Hotp => Ok(Code {
            code: hotp(&key, secret.counter, secret.digits, secret.algorithm)?,
            remaining_secs: None,
        }),
    }
}

/// The code for `secret` right now.
pub fn current_code(secret: &Secret) -> Result<Code> {
    code_at(secret, unix_now())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|e| OtpVaultError::InvalidSecret(format!("HMAC key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Dynamic truncation, RFC 4226 §5.3.
fn truncate(digest: &[u8], digits: u8) -> String {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    let code = u64::from(binary) % 10u64.pow(u32::from(digits));
    format!("{code:0>width$}", width = digits as usize)
}
