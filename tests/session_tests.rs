//! Session guard tests against a store on disk.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::fast_settings;
use otpvault::errors::OtpVaultError;
use otpvault::session::{
    LockReason, LockoutPolicy, OsEvent, SecurityChange, SessionGuard, SessionListener,
    SessionPolicy,
};
use otpvault::vault::{Secret, SecretStore, StoreState};
use tempfile::TempDir;
use zeroize::Zeroizing;

const PASSWORD: &str = "correct-horse-battery";

#[derive(Default)]
struct HideCounter {
    hidden: AtomicUsize,
}

impl SessionListener for HideCounter {
    fn on_lock(&self, _reason: LockReason) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }
}

fn guarded_store(dir: &TempDir, policy: SessionPolicy) -> SessionGuard {
    let store = SecretStore::open(&dir.path().join("otpvault.json"), &fast_settings()).unwrap();
    SessionGuard::new(store, policy)
}

fn protect(guard: &SessionGuard) {
    let pending = guard
        .propose(SecurityChange::SetPassword(Zeroizing::new(PASSWORD.to_string())))
        .unwrap();
    let outcome = guard.confirm(pending).unwrap();
    assert!(outcome.restart_required);
}

#[test]
fn confirmed_password_applies_to_the_next_process() {
    let dir = TempDir::new().unwrap();
    {
        let guard = guarded_store(&dir, SessionPolicy::default());
        protect(&guard);
        guard
            .with_store(|store| {
                store.add_secrets(vec![Secret::totp("alice", "Example", "JBSWY3DPEHPK3PXP")])
            })
            .unwrap();
    }

    let guard = guarded_store(&dir, SessionPolicy::default());
    assert_eq!(guard.state(), StoreState::Locked);
    guard.unlock(PASSWORD).unwrap();
    let names = guard
        .with_store(|store| Ok(store.list()?.into_iter().map(|s| s.name).collect::<Vec<_>>()))
        .unwrap();
    assert_eq!(names, ["alice"]);
}

#[test]
fn suspend_from_another_thread_hides_codes() {
    let dir = TempDir::new().unwrap();
    let guard = Arc::new(guarded_store(&dir, SessionPolicy::default()));
    protect(&guard);

    let counter = Arc::new(HideCounter::default());
    guard.add_listener(counter.clone());

    let platform = {
        let guard = Arc::clone(&guard);
        thread::spawn(move || guard.handle_event(OsEvent::Suspend))
    };
    assert!(platform.join().unwrap());

    assert_eq!(guard.state(), StoreState::Locked);
    assert_eq!(counter.hidden.load(Ordering::SeqCst), 1);
    assert!(matches!(
        guard.with_store(|store| store.list()),
        Err(OtpVaultError::Locked)
    ));

    // Resume never unlocks.
    assert!(!guard.handle_event(OsEvent::Resume));
    assert_eq!(guard.state(), StoreState::Locked);
}

#[test]
fn repeated_wrong_passwords_back_off() {
    let dir = TempDir::new().unwrap();
    let policy = SessionPolicy {
        idle_timeout: None,
        lockout: LockoutPolicy {
            max_attempts: 2,
            base: Duration::from_secs(60),
        },
    };
    let guard = guarded_store(&dir, policy);
    protect(&guard);
    guard.lock();

    for _ in 0..2 {
        assert!(matches!(
            guard.unlock("not-the-password"),
            Err(OtpVaultError::WrongPassword)
        ));
    }
    // Even the right password waits out the delay.
    match guard.unlock(PASSWORD) {
        Err(OtpVaultError::TooManyAttempts { retry_after_secs }) => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 60)
        }
        other => panic!("expected TooManyAttempts, got {other:?}"),
    }
    assert_eq!(guard.state(), StoreState::Locked);
}

#[test]
fn reset_works_while_locked() {
    let dir = TempDir::new().unwrap();
    let guard = guarded_store(&dir, SessionPolicy::default());
    protect(&guard);
    guard.lock();

    let pending = guard.propose(SecurityChange::Reset).unwrap();
    guard.confirm(pending).unwrap();
    assert_eq!(guard.state(), StoreState::Unconfigured);

    let reopened = guarded_store(&dir, SessionPolicy::default());
    assert_eq!(reopened.state(), StoreState::Unconfigured);
}
