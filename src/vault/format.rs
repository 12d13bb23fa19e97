//! On-disk store document and its atomic persistence.
//!
//! The store is a single JSON file:
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "security": { "require_password", "password", "key", "key_salt", "argon2" },
//!   "secrets":  [ { "id", "ciphertext", "created_at" }, ... ]
//! }
//! ```
//!
//! - **format_version**: explicit schema version. Files without it are
//!   legacy documents; missing keys are filled with defaults and the
//!   caller rewrites the file.
//! - **security**: `SecurityConfig`, see its docs for the invariants.
//! - **secrets**: sealed `StoredSecret` entries in insertion order.
//!
//! Every write serializes the complete document to a temp file in the
//! same directory and renames it over the target.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::secret::StoredSecret;
use crate::crypto::kdf::KEY_LEN;
use crate::crypto::Argon2Params;
use crate::errors::{OtpVaultError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current document schema version.
pub const CURRENT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SecurityConfig
// ---------------------------------------------------------------------------

/// Password and key configuration persisted alongside the secrets.
///
/// - `require_password == None`: first run, nothing configured, no key.
/// - `Some(true)`: `password` holds an Argon2id PHC hash and `key` holds
///   the data key wrapped under an Argon2id key derived with `key_salt`.
/// - `Some(false)`: `key` holds the data key in clear; no hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub require_password: Option<bool>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(
        default,
        serialize_with = "opt_base64_encode",
        deserialize_with = "opt_base64_decode"
    )]
    pub key: Option<Vec<u8>>,

    #[serde(
        default,
        serialize_with = "opt_base64_encode",
        deserialize_with = "opt_base64_decode"
    )]
    pub key_salt: Option<Vec<u8>>,

    /// Argon2 params used for `password` and the wrapping key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argon2: Option<Argon2Params>,
}

impl SecurityConfig {
    /// Check the cross-field invariants.
    pub fn check(&self) -> std::result::Result<(), String> {
        match self.require_password {
            None if self.key.is_some() || self.password.is_some() => {
                Err("unconfigured store carries key material".into())
            }
            Some(true) if self.password.is_none() || self.key.is_none() => {
                Err("password protection enabled without hash or key".into())
            }
            Some(true) if self.key_salt.is_none() => {
                Err("password protection enabled without key salt".into())
            }
            Some(false) if self.key.is_none() => Err("password disabled without key".into()),
            Some(false) if self.password.is_some() => {
                Err("password disabled but a hash is still stored".into())
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreDocument
// ---------------------------------------------------------------------------

/// The complete persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub format_version: u32,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub secrets: Vec<StoredSecret>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            format_version: CURRENT_VERSION,
            security: SecurityConfig::default(),
            secrets: Vec::new(),
        }
    }
}

/// A document read from disk, plus whether it had to be upgraded.
pub struct LoadedDocument {
    pub document: StoreDocument,
    pub migrated: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read and validate a store document.
///
/// Legacy documents (no `format_version`) are upgraded in memory and
/// reported with `migrated = true`; unknown keys such as old UI settings
/// are dropped.
pub fn read_document(path: &Path) -> Result<LoadedDocument> {
    let bytes = fs::read(path)?;
    let invalid = |reason: String| OtpVaultError::InvalidStoreFormat {
        path: path.to_path_buf(),
        reason,
    };

    let mut value: Value =
        serde_json::from_slice(&bytes).map_err(|e| invalid(format!("JSON: {e}")))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| invalid("top level must be an object".into()))?;

    let migrated = match object.get("format_version").and_then(Value::as_u64) {
        Some(v) if v > u64::from(CURRENT_VERSION) => {
            return Err(invalid(format!(
                "format version {v} is newer than supported version {CURRENT_VERSION}"
            )));
        }
        Some(_) => false,
        None => {
            object.insert("format_version".into(), Value::from(CURRENT_VERSION));
            let security = object
                .entry("security")
                .or_insert_with(|| Value::Object(Default::default()));
            if !legacy_security_usable(security) {
                tracing::warn!(
                    path = %path.display(),
                    "legacy security settings use an unsupported scheme; store starts unconfigured"
                );
                *security = Value::Object(Default::default());
                object.insert("secrets".into(), Value::Array(Vec::new()));
            }
            object
                .entry("secrets")
                .or_insert_with(|| Value::Array(Vec::new()));
            true
        }
    };

    let document: StoreDocument =
        serde_json::from_value(value).map_err(|e| invalid(format!("document: {e}")))?;
    document.security.check().map_err(invalid)?;

    Ok(LoadedDocument { document, migrated })
}

/// Whether a legacy `security` section can be carried over as-is.
///
/// Older releases hashed passwords with bcrypt and kept a 16-byte salt in
/// `key`; neither can unwrap a data key, so such sections are dropped.
fn legacy_security_usable(security: &Value) -> bool {
    let Ok(config) = serde_json::from_value::<SecurityConfig>(security.clone()) else {
        return false;
    };
    if config.check().is_err() {
        return false;
    }
    match config.require_password {
        None => true,
        Some(true) => config
            .password
            .as_deref()
            .is_some_and(|hash| hash.starts_with("$argon2id$")),
        Some(false) => config.key.as_ref().is_some_and(|key| key.len() == KEY_LEN),
    }
}

/// Write a store document to disk **atomically**.
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem. On failure the previous file is left untouched.
pub fn write_document(path: &Path, document: &StoreDocument) -> Result<()> {
    let persistence = |source: std::io::Error| OtpVaultError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| OtpVaultError::SerializationError(format!("store document: {e}")))?;

    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent).map_err(persistence)?;
    }
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, &bytes).map_err(persistence)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms).map_err(persistence)?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(persistence(e));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded byte fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

fn opt_base64_encode<S>(data: &Option<Vec<u8>>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match data {
        Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

fn opt_base64_decode<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| BASE64.decode(&s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otpvault.json");

        let doc = StoreDocument {
            security: SecurityConfig {
                require_password: Some(false),
                key: Some(vec![1; 32]),
                ..SecurityConfig::default()
            },
            ..StoreDocument::default()
        };
        write_document(&path, &doc).unwrap();

        let loaded = read_document(&path).unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.document.security, doc.security);
        assert!(!dir.path().join(".otpvault.json.tmp").exists());
    }

    #[test]
    fn legacy_document_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"settings":{"close_to_tray":true},"security":{"require_password":null,"password":null,"key":null}}"#,
        )
        .unwrap();

        let loaded = read_document(&path).unwrap();
        assert!(loaded.migrated);
        assert_eq!(loaded.document.format_version, CURRENT_VERSION);
        assert_eq!(loaded.document.security.require_password, None);
        assert!(loaded.document.secrets.is_empty());
    }

    #[test]
    fn legacy_bcrypt_security_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"security":{"require_password":true,"password":"$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy","key":"q83vEjRWeJCrze8SNFZ4kA=="}}"#,
        )
        .unwrap();

        let loaded = read_document(&path).unwrap();
        assert!(loaded.migrated);
        assert_eq!(loaded.document.security, SecurityConfig::default());
        assert!(loaded.document.secrets.is_empty());
    }

    #[test]
    fn legacy_short_clear_key_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"security":{"require_password":false,"password":null,"key":"q83vEjRWeJCrze8SNFZ4kA=="}}"#,
        )
        .unwrap();

        let loaded = read_document(&path).unwrap();
        assert!(loaded.migrated);
        assert_eq!(loaded.document.security.require_password, None);
        assert!(loaded.document.security.key.is_none());
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otpvault.json");
        fs::write(&path, r#"{"format_version": 99}"#).unwrap();
        assert!(read_document(&path).is_err());
    }

    #[test]
    fn inconsistent_security_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otpvault.json");
        fs::write(
            &path,
            r#"{"format_version":1,"security":{"require_password":true,"password":null,"key":null}}"#,
        )
        .unwrap();
        assert!(matches!(
            read_document(&path),
            Err(OtpVaultError::InvalidStoreFormat { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otpvault.json");
        fs::write(&path, b"not json").unwrap();
        assert!(read_document(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otpvault.json");
        write_document(&path, &StoreDocument::default()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
