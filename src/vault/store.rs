//! High-level store operations used by the session guard and the CLI.
//!
//! `SecretStore` wraps the document layer and the crypto layer so the
//! rest of the application works with calls like
//! `store.add_secrets(vec![secret])`.
//!
//! Every mutation builds the next document, writes it to disk, and only
//! then replaces the in-memory copy. A failed write leaves both the file
//! and the store as they were.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::config::settings::Settings;
use crate::crypto::kdf::{derive_wrapping_key, generate_salt, hash_password, verify_password};
use crate::crypto::{open, seal, Argon2Params, DataKey};
use crate::errors::{OtpVaultError, Result};

use super::format::{self, SecurityConfig, StoreDocument};
use super::policy;
use super::secret::{Secret, SecretSummary, StoredSecret};

/// Coarse lifecycle state derived from the security config and the
/// presence of key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// First run: neither a password nor a clear key has been chosen.
    Unconfigured,
    Locked,
    Unlocked,
}

/// The store handle. Create one with `SecretStore::open`.
pub struct SecretStore {
    /// Path to the JSON store file.
    path: PathBuf,

    /// Argon2 cost used when a new password is set.
    params: Argon2Params,

    /// Last document successfully written to (or read from) disk.
    document: StoreDocument,

    /// Decrypted data key; present iff unlocked.
    key: Option<DataKey>,
}

impl SecretStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the store at `path`, creating an unconfigured one if the file
    /// does not exist yet.
    ///
    /// Legacy documents are upgraded and written back immediately. A store
    /// with password protection disabled comes up unlocked.
    pub fn open(path: &Path, settings: &Settings) -> Result<Self> {
        let document = if path.exists() {
            let loaded = format::read_document(path)?;
            if loaded.migrated {
                tracing::info!(path = %path.display(), "migrating legacy store document");
                format::write_document(path, &loaded.document)?;
            }
            loaded.document
        } else {
            tracing::info!(path = %path.display(), "creating new store");
            let document = StoreDocument::default();
            format::write_document(path, &document)?;
            document
        };

        let mut store = Self {
            path: path.to_path_buf(),
            params: settings.argon2_params(),
            document,
            key: None,
        };

        if store.document.security.require_password == Some(false) {
            store.key = Some(store.clear_key()?);
        }

        tracing::debug!(
            secrets = store.document.secrets.len(),
            state = ?store.state(),
            "store opened"
        );
        Ok(store)
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        match (self.document.security.require_password, &self.key) {
            (None, _) => StoreState::Unconfigured,
            (Some(_), Some(_)) => StoreState::Unlocked,
            (Some(_), None) => StoreState::Locked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// `Some(true)` when a password gates the store, `None` on first run.
    pub fn require_password(&self) -> Option<bool> {
        self.document.security.require_password
    }

    /// Verify `password` and load the data key.
    ///
    /// On failure the store stays exactly as it was. A store without
    /// password protection ignores `password`.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let security = &self.document.security;
        let key = match security.require_password {
            None => return Err(OtpVaultError::Unconfigured),
            Some(false) => self.clear_key()?,
            Some(true) => {
                let (Some(hash), Some(wrapped), Some(salt)) =
                    (&security.password, &security.key, &security.key_salt)
                else {
                    return Err(self.invalid("password protection enabled without key material"));
                };

                if !verify_password(password.as_bytes(), hash) {
                    tracing::debug!("unlock rejected");
                    return Err(OtpVaultError::WrongPassword);
                }

                let params = security.argon2.unwrap_or_default();
                let mut kek = derive_wrapping_key(password.as_bytes(), salt, &params)?;
                let key = DataKey::unwrap(&kek, wrapped);
                kek.zeroize();
                key.map_err(|_| OtpVaultError::WrongPassword)?
            }
        };

        self.key = Some(key);
        tracing::debug!("store unlocked");
        Ok(())
    }

    /// Drop the key material. Calling it on a locked store does nothing.
    pub fn lock(&mut self) {
        if self.key.take().is_some() {
            tracing::debug!("store locked");
        }
    }

    // ------------------------------------------------------------------
    // Security configuration
    // ------------------------------------------------------------------

    /// Turn on (or change) password protection.
    ///
    /// Only allowed on an unconfigured or unlocked store. A fresh data
    /// key is generated and every secret is re-encrypted under it.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        policy::check_password(password)?;
        let plain = self.decrypt_for_rekey()?;

        let params = self.params;
        let key = DataKey::generate();
        let salt = generate_salt();
        let hash = hash_password(password.as_bytes(), &params)?;
        let mut kek = derive_wrapping_key(password.as_bytes(), &salt, &params)?;
        let wrapped = key.wrap(&kek);
        kek.zeroize();

        let security = SecurityConfig {
            require_password: Some(true),
            password: Some(hash),
            key: Some(wrapped?),
            key_salt: Some(salt.to_vec()),
            argon2: Some(params),
        };

        self.rekey(key, security, plain)?;
        tracing::info!("password protection enabled");
        Ok(())
    }

    /// Turn off password protection.
    ///
    /// Secrets stay encrypted at rest under a new random data key that is
    /// stored in clear next to them.
    pub fn disable_password(&mut self) -> Result<()> {
        let plain = self.decrypt_for_rekey()?;

        let key = DataKey::generate();
        let security = SecurityConfig {
            require_password: Some(false),
            password: None,
            key: Some(key.as_bytes().to_vec()),
            key_salt: None,
            argon2: None,
        };

        self.rekey(key, security, plain)?;
        tracing::warn!("password protection disabled; data key is stored unprotected");
        Ok(())
    }

    /// Destroy every secret and the security config.
    ///
    /// Works in any state; the store ends up unconfigured.
    pub fn reset(&mut self) -> Result<()> {
        let document = StoreDocument::default();
        format::write_document(&self.path, &document)?;
        self.document = document;
        self.key = None;
        tracing::info!("store reset");
        Ok(())
    }

    /// Re-read the file, picking up changes made by another process.
    ///
    /// The store stays unlocked only if the wrapped key on disk is the one
    /// the current key came from; otherwise it locks.
    pub fn reload(&mut self) -> Result<()> {
        let loaded = format::read_document(&self.path)?;
        if loaded.migrated {
            format::write_document(&self.path, &loaded.document)?;
        }

        let same_key = loaded.document.security.key == self.document.security.key
            && loaded.document.security.require_password
                == self.document.security.require_password;

        self.document = loaded.document;
        match self.document.security.require_password {
            Some(false) => self.key = Some(self.clear_key()?),
            Some(true) if same_key => {}
            _ => self.lock(),
        }

        tracing::debug!(state = ?self.state(), "store reloaded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Append secrets in order, returning their new ids.
    ///
    /// All secrets are validated before anything is written; one bad
    /// record rejects the whole call. Duplicates are kept.
    pub fn add_secrets(&mut self, secrets: Vec<Secret>) -> Result<Vec<Uuid>> {
        let key = self.require_key()?;
        let secrets: Vec<Secret> = secrets.into_iter().map(Secret::canonical).collect();
        for secret in &secrets {
            secret.validate()?;
        }
        if secrets.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut next = self.document.clone();
        let mut ids = Vec::with_capacity(secrets.len());
        for secret in &secrets {
            let id = Uuid::new_v4();
            next.secrets.push(StoredSecret {
                id,
                ciphertext: seal_secret(key, &id, secret)?,
                created_at: now,
            });
            ids.push(id);
        }

        self.commit(next)?;
        tracing::info!(count = ids.len(), "secrets added");
        Ok(ids)
    }

    /// Delete one secret by id.
    pub fn remove_secret(&mut self, id: &Uuid) -> Result<()> {
        self.require_key()?;
        let index = self
            .document
            .secrets
            .iter()
            .position(|s| s.id == *id)
            .ok_or(OtpVaultError::NotFound(*id))?;

        let mut next = self.document.clone();
        next.secrets.remove(index);
        self.commit(next)?;
        tracing::info!(%id, "secret removed");
        Ok(())
    }

    /// Decrypt and return one secret.
    pub fn get(&self, id: &Uuid) -> Result<Secret> {
        let key = self.require_key()?;
        let stored = self
            .document
            .secrets
            .iter()
            .find(|s| s.id == *id)
            .ok_or(OtpVaultError::NotFound(*id))?;
        open_secret(key, stored)
    }

    /// Decrypt every secret, in insertion order.
    pub fn export_all(&self) -> Result<Vec<Secret>> {
        let key = self.require_key()?;
        self.document
            .secrets
            .iter()
            .map(|stored| open_secret(key, stored))
            .collect()
    }

    /// Id, name, and issuer of every secret, in insertion order.
    pub fn list(&self) -> Result<Vec<SecretSummary>> {
        let key = self.require_key()?;
        self.document
            .secrets
            .iter()
            .map(|stored| {
                let secret = open_secret(key, stored)?;
                Ok(SecretSummary {
                    id: stored.id,
                    name: secret.name.clone(),
                    issuer: secret.issuer.clone(),
                    otp_type: secret.otp_type,
                    created_at: stored.created_at,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored secrets. Does not need the key.
    pub fn len(&self) -> usize {
        self.document.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.secrets.is_empty()
    }

    /// The persisted security section.
    pub fn security(&self) -> &SecurityConfig {
        &self.document.security
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_key(&self) -> Result<&DataKey> {
        match (&self.key, self.document.security.require_password) {
            (Some(key), _) => Ok(key),
            (None, None) => Err(OtpVaultError::Unconfigured),
            (None, Some(_)) => Err(OtpVaultError::Locked),
        }
    }

    /// Decrypt everything ahead of a key change. An unconfigured store
    /// has nothing to decrypt; a locked one is refused.
    fn decrypt_for_rekey(&self) -> Result<Vec<(StoredSecret, Secret)>> {
        if self.state() == StoreState::Unconfigured {
            return Ok(Vec::new());
        }
        let key = self.require_key()?;
        self.document
            .secrets
            .iter()
            .map(|stored| Ok((stored.clone(), open_secret(key, stored)?)))
            .collect()
    }

    /// Re-seal `plain` under `key`, persist with `security`, then switch.
    fn rekey(
        &mut self,
        key: DataKey,
        security: SecurityConfig,
        plain: Vec<(StoredSecret, Secret)>,
    ) -> Result<()> {
        let secrets = plain
            .into_iter()
            .map(|(stored, secret)| {
                Ok(StoredSecret {
                    ciphertext: seal_secret(&key, &stored.id, &secret)?,
                    ..stored
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let next = StoreDocument {
            security,
            secrets,
            ..self.document.clone()
        };
        self.commit(next)?;
        self.key = Some(key);
        Ok(())
    }

    fn commit(&mut self, next: StoreDocument) -> Result<()> {
        format::write_document(&self.path, &next)?;
        self.document = next;
        Ok(())
    }

    fn clear_key(&self) -> Result<DataKey> {
        let raw = self
            .document
            .security
            .key
            .as_deref()
            .ok_or_else(|| self.invalid("password disabled without key"))?;
        DataKey::from_slice(raw)
    }

    fn invalid(&self, reason: &str) -> OtpVaultError {
        OtpVaultError::InvalidStoreFormat {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Encrypt one secret under its entry key, bound to its id.
fn seal_secret(key: &DataKey, id: &Uuid, secret: &Secret) -> Result<Vec<u8>> {
    let json = Zeroizing::new(
        serde_json::to_vec(secret)
            .map_err(|e| OtpVaultError::SerializationError(format!("secret: {e}")))?,
    );
    let mut entry_key = key.entry_key(id)?;
    let sealed = seal(&entry_key, &json, id.as_bytes());
    entry_key.zeroize();
    sealed
}

fn open_secret(key: &DataKey, stored: &StoredSecret) -> Result<Secret> {
    let mut entry_key = key.entry_key(&stored.id)?;
    let json = open(&entry_key, &stored.ciphertext, stored.id.as_bytes());
    entry_key.zeroize();
    let json = Zeroizing::new(json?);

    serde_json::from_slice(&json)
        .map_err(|e| OtpVaultError::SerializationError(format!("secret {}: {e}", stored.id)))
}
