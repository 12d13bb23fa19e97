//! Integration tests for the secret store: persistence, security
//! changes and legacy documents.

mod common;

use std::fs;

use common::fast_settings;
use otpvault::errors::OtpVaultError;
use otpvault::vault::{Secret, SecretStore, StoreState};
use tempfile::TempDir;

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("otpvault.json")
}

// ---------------------------------------------------------------------------
// Persistence across reopen
// ---------------------------------------------------------------------------

#[test]
fn password_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    let ids = {
        let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
        store.set_password("correct-horse-battery").unwrap();
        store
            .add_secrets(vec![
                Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP"),
                Secret::totp("bob", "Bank", "GEZDGNBVGY3TQOJQ"),
            ])
            .unwrap()
    };

    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Locked);
    assert_eq!(store.len(), 2);
    assert!(matches!(store.list(), Err(OtpVaultError::Locked)));

    assert!(matches!(
        store.unlock("wrong-password"),
        Err(OtpVaultError::WrongPassword)
    ));
    assert_eq!(store.state(), StoreState::Locked);

    store.unlock("correct-horse-battery").unwrap();
    let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, ["alice", "bob"]);
    assert_eq!(store.get(&ids[1]).unwrap().issuer, "Bank");
}

#[test]
fn secrets_are_not_stored_in_clear() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    store.set_password("correct-horse-battery").unwrap();
    store
        .add_secrets(vec![Secret::totp("alice@example.com", "Example", "JBSWY3DPEHPK3PXP")])
        .unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("JBSWY3DPEHPK3PXP"));
    assert!(!raw.contains("alice@example.com"));
    assert!(!raw.contains("correct-horse-battery"));
}

#[test]
fn disable_then_enable_password_keeps_secrets() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    {
        let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
        store.set_password("correct-horse-battery").unwrap();
        store
            .add_secrets(vec![Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP")])
            .unwrap();
        store.disable_password().unwrap();
    }

    // Passwordless stores come up unlocked.
    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Unlocked);
    assert_eq!(store.security().require_password, Some(false));
    assert!(store.security().password.is_none());
    assert_eq!(store.export_all().unwrap()[0].secret, "JBSWY3DPEHPK3PXP");

    store.set_password("another-long-password").unwrap();
    drop(store);

    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert!(matches!(
        store.unlock("correct-horse-battery"),
        Err(OtpVaultError::WrongPassword)
    ));
    store.unlock("another-long-password").unwrap();
    assert_eq!(store.export_all().unwrap()[0].name, "alice");
}

#[test]
fn reset_discards_everything_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    {
        let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
        store.set_password("correct-horse-battery").unwrap();
        store
            .add_secrets(vec![Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP")])
            .unwrap();
        store.lock();
        // Reset needs no password.
        store.reset().unwrap();
    }

    let store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Unconfigured);
    assert!(store.is_empty());
    assert!(store.security().password.is_none());
    assert!(store.security().key.is_none());
}

// ---------------------------------------------------------------------------
// Documents written by older versions
// ---------------------------------------------------------------------------

#[test]
fn legacy_settings_file_is_upgraded_in_place() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    fs::write(
        &path,
        r#"{"settings":{"theme":"dark"},"security":{"require_password":null,"password":null,"key":null}}"#,
    )
    .unwrap();

    let store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Unconfigured);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["format_version"], 1);
    assert!(raw.get("settings").is_none());
    assert!(raw["secrets"].as_array().unwrap().is_empty());
}

#[test]
fn legacy_bcrypt_password_store_opens_unconfigured() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    fs::write(
        &path,
        r#"{"settings":{"language":0},"security":{"require_password":true,"password":"$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy","key":"q83vEjRWeJCrze8SNFZ4kA=="}}"#,
    )
    .unwrap();

    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Unconfigured);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["format_version"], 1);
    assert!(raw["security"]["password"].is_null());
    assert!(raw["security"]["key"].is_null());

    // The upgraded store is usable right away.
    store.set_password("correct-horse-battery").unwrap();
    store
        .add_secrets(vec![Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP")])
        .unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn legacy_passwordless_store_opens_unconfigured() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    fs::write(
        &path,
        r#"{"security":{"require_password":false,"password":null,"key":"q83vEjRWeJCrze8SNFZ4kA=="}}"#,
    )
    .unwrap();

    let store = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(store.state(), StoreState::Unconfigured);
    assert!(store.security().key.is_none());

    let reopened = SecretStore::open(&path, &fast_settings()).unwrap();
    assert_eq!(reopened.state(), StoreState::Unconfigured);
}

#[test]
fn corrupt_store_is_reported_not_replaced() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    fs::write(&path, "{ this is not json").unwrap();

    assert!(matches!(
        SecretStore::open(&path, &fast_settings()),
        Err(OtpVaultError::InvalidStoreFormat { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
}

#[test]
fn failed_write_leaves_previous_file() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    let mut store = SecretStore::open(&path, &fast_settings()).unwrap();
    store.disable_password().unwrap();
    store
        .add_secrets(vec![Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP")])
        .unwrap();
    let before = fs::read(&path).unwrap();

    // A directory squatting on the temp-file name makes the write fail.
    fs::create_dir(dir.path().join(".otpvault.json.tmp")).unwrap();
    let result = store.add_secrets(vec![Secret::totp("bob", "Bank", "GEZDGNBVGY3TQOJQ")]);

    assert!(matches!(result, Err(OtpVaultError::Persistence { .. })));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(store.len(), 1);
}
