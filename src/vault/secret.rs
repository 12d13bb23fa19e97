//! Credential records: the plaintext `Secret` and its at-rest form.
//!
//! A `Secret` only ever exists decrypted in memory. On disk each one is a
//! `StoredSecret`: an id, a timestamp, and the AES-GCM sealed JSON of the
//! `Secret` (base64 in the store file).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::{base64_decode, base64_encode};
use crate::errors::{OtpVaultError, Result};

/// One-time password flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpType {
    #[default]
    Totp,
    Hotp,
}

impl fmt::Display for OtpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Totp => f.write_str("totp"),
            Self::Hotp => f.write_str("hotp"),
        }
    }
}

/// HMAC hash used for code generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    /// Name as used in otpauth URIs (`SHA1`, `SHA256`, `SHA512`).
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl FromStr for Algorithm {
    type Err = OtpVaultError;

    /// Accepts `SHA1`, `sha-256`, `HmacSHA512` and similar spellings.
    fn from_str(s: &str) -> Result<Self> {
        let cleaned: String = s
            .to_ascii_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match cleaned.trim_start_matches("HMAC") {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(OtpVaultError::InvalidSecret(format!(
                "unsupported algorithm '{s}'"
            ))),
        }
    }
}

pub const DEFAULT_DIGITS: u8 = 6;
pub const DEFAULT_PERIOD: u32 = 30;

/// A single 2FA credential, decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    /// Base32 shared key, upper case, no padding or whitespace.
    pub secret: String,
    #[serde(default, rename = "type")]
    pub otp_type: OtpType,
    #[serde(default = "default_digits")]
    pub digits: u8,
    #[serde(default = "default_period")]
    pub period: u32,
    #[serde(default)]
    pub counter: u64,
    #[serde(default)]
    pub algorithm: Algorithm,
}

fn default_digits() -> u8 {
    DEFAULT_DIGITS
}

fn default_period() -> u32 {
    DEFAULT_PERIOD
}

impl Secret {
    /// A TOTP secret with standard parameters.
    ///
    /// Name and issuer are trimmed and the key is normalized, but not
    /// validated; call `validate` (or go through the store) for that.
    pub fn totp(name: &str, issuer: &str, secret: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            issuer: issuer.trim().to_string(),
            secret: normalize_base32(secret),
            otp_type: OtpType::Totp,
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            counter: 0,
            algorithm: Algorithm::Sha1,
        }
    }

    /// The canonical form: trimmed labels, normalized base32, and the
    /// default period for HOTP, which has no time step.
    pub fn canonical(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.issuer = self.issuer.trim().to_string();
        self.secret = normalize_base32(&self.secret);
        if self.otp_type == OtpType::Hotp {
            self.period = DEFAULT_PERIOD;
        }
        self
    }

    /// Check the invariants every stored secret must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OtpVaultError::InvalidSecret("name cannot be empty".into()));
        }
        if !is_valid_base32(&self.secret) {
            return Err(OtpVaultError::InvalidSecret(format!(
                "secret for '{}' is not valid base32",
                self.name
            )));
        }
        if !(6..=8).contains(&self.digits) {
            return Err(OtpVaultError::InvalidSecret(format!(
                "digits must be between 6 and 8 (got {})",
                self.digits
            )));
        }
        if self.period == 0 {
            return Err(OtpVaultError::InvalidSecret("period must be positive".into()));
        }
        Ok(())
    }

    /// Raw key bytes decoded from the base32 secret.
    pub fn key_bytes(&self) -> Result<Vec<u8>> {
        decode_base32(&self.secret).ok_or_else(|| {
            OtpVaultError::InvalidSecret(format!("secret for '{}' is not valid base32", self.name))
        })
    }
}

/// Upper-case a base32 key and strip spaces, dashes, and `=` padding.
pub fn normalize_base32(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Decode a normalized or raw base32 string (RFC 4648, padding optional).
pub fn decode_base32(raw: &str) -> Option<Vec<u8>> {
    let normalized = normalize_base32(raw);
    if normalized.is_empty() {
        return None;
    }
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &normalized)
        .filter(|bytes| !bytes.is_empty())
}

/// Encode raw key bytes as unpadded base32.
pub fn encode_base32(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

/// `true` when `raw` is a non-empty key in the RFC 4648 base32 alphabet.
pub fn is_valid_base32(raw: &str) -> bool {
    let normalized = normalize_base32(raw);
    !normalized.is_empty()
        && normalized
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
        && decode_base32(&normalized).is_some()
}

/// A secret as persisted: sealed payload plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSecret {
    pub id: Uuid,

    /// Nonce-prefixed AES-256-GCM ciphertext of the JSON `Secret`.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    pub created_at: DateTime<Utc>,
}

/// Display-level view of a stored secret.
#[derive(Debug, Clone)]
pub struct SecretSummary {
    pub id: Uuid,
    pub name: String,
    pub issuer: String,
    pub otp_type: OtpType,
    pub created_at: DateTime<Utc>,
}
