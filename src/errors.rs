use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::import::ImportFailure;

/// Why a text payload could not be turned into secrets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing or invalid base32 `secret` parameter")]
    MissingSecret,

    #[error("malformed export payload: {0}")]
    MalformedExport(String),

    #[error("unrecognized payload format")]
    UnknownFormat,
}

/// All errors that can occur in OtpVault.
#[derive(Debug, Error)]
pub enum OtpVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Import errors ---
    #[error("No QR code found in image")]
    DecodeNotFound,

    #[error("Could not read image: {0}")]
    ImageError(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Nothing was imported — {} source(s) failed", .failures.len())]
    NothingImported { failures: Vec<ImportFailure> },

    #[error("Import cancelled")]
    Cancelled,

    // --- Store / session errors ---
    #[error("Wrong password")]
    WrongPassword,

    #[error("Too many failed attempts — try again in {retry_after_secs}s")]
    TooManyAttempts { retry_after_secs: u64 },

    #[error("Store is locked — unlock it first")]
    Locked,

    #[error("Store is not configured yet — set a password or disable it first")]
    Unconfigured,

    #[error("Store is already configured")]
    AlreadyConfigured,

    #[error("Secret {0} not found")]
    NotFound(Uuid),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error("Invalid store file {path}: {reason}")]
    InvalidStoreFormat { path: PathBuf, reason: String },

    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

/// Convenience type alias for OtpVault results.
pub type Result<T> = std::result::Result<T, OtpVaultError>;
