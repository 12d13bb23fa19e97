//! Session guard: who may touch the store, and when it locks again.
//!
//! `SessionGuard` owns the `SecretStore` behind a mutex, so unlock, lock
//! and password changes are mutually exclusive even when an OS lock-screen
//! event arrives from another thread in the middle of one.
//!
//! Lock triggers:
//! - an explicit `lock()`;
//! - `OsEvent::LockScreen` / `OsEvent::Suspend` while a password is
//!   required;
//! - the optional idle timeout, checked by `tick()` and before every
//!   `with_store` call.
//!
//! Security changes (set or disable the password, reset) go through
//! `propose` then `confirm`, and report whether a restart is needed.

mod idle;
mod lockout;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{OtpVaultError, Result};
use crate::vault::policy;
use crate::vault::store::{SecretStore, StoreState};

pub use idle::IdleTimer;
pub use lockout::{LockoutPolicy, LockoutTracker};

/// Notifications delivered by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsEvent {
    LockScreen,
    Suspend,
    Resume,
}

/// Why the session was locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    Explicit,
    LockScreen,
    Suspend,
    Idle,
}

/// A presentation surface that must hide codes when the session locks.
pub trait SessionListener: Send + Sync {
    fn on_lock(&self, reason: LockReason);

    fn on_unlock(&self) {}
}

/// Timing rules for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionPolicy {
    /// Lock after this much inactivity; `None` disables idle locking.
    pub idle_timeout: Option<Duration>,
    pub lockout: LockoutPolicy,
}

impl SessionPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            idle_timeout: settings.idle_timeout(),
            lockout: LockoutPolicy {
                max_attempts: settings.lockout_max_attempts,
                base: Duration::from_secs(settings.lockout_base_seconds),
            },
        }
    }
}

/// An irreversible change to the security configuration.
pub enum SecurityChange {
    SetPassword(Zeroizing<String>),
    DisablePassword,
    Reset,
}

impl fmt::Debug for SecurityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPassword(_) => f.write_str("SetPassword(..)"),
            Self::DisablePassword => f.write_str("DisablePassword"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}

/// A checked change waiting for confirmation. Only `propose` builds one.
#[derive(Debug)]
pub struct PendingChange {
    change: SecurityChange,
}

impl PendingChange {
    pub fn change(&self) -> &SecurityChange {
        &self.change
    }

    /// One-line description for a confirmation prompt.
    pub fn summary(&self) -> &'static str {
        match self.change {
            SecurityChange::SetPassword(_) => {
                "Set a new password and re-encrypt every secret under a new key"
            }
            SecurityChange::DisablePassword => {
                "Remove the password; secrets stay encrypted but anyone with this account can open them"
            }
            SecurityChange::Reset => "Delete every secret and the security configuration",
        }
    }
}

/// Result of an applied change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOutcome {
    pub restart_required: bool,
}

/// Lockout and idle bookkeeping, kept apart from the store mutex.
struct Tracking {
    lockout: LockoutTracker,
    idle: IdleTimer,
}

/// The single owner of the store for the life of the process.
pub struct SessionGuard {
    store: Arc<Mutex<SecretStore>>,
    tracking: Mutex<Tracking>,
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
}

impl SessionGuard {
    pub fn new(store: SecretStore, policy: SessionPolicy) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            tracking: Mutex::new(Tracking {
                lockout: LockoutTracker::new(policy.lockout),
                idle: IdleTimer::new(policy.idle_timeout),
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a surface to be told about lock and unlock.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        lock_ignoring_poison(&self.listeners).push(listener);
    }

    pub fn state(&self) -> StoreState {
        lock_ignoring_poison(&self.store).state()
    }

    /// Unlock with `password`, subject to the failure backoff.
    pub fn unlock(&self, password: &str) -> Result<()> {
        let mut store = lock_ignoring_poison(&self.store);
        let mut tracking = lock_ignoring_poison(&self.tracking);

        let now = Instant::now();
        if let Some(left) = tracking.lockout.retry_after(now) {
            return Err(OtpVaultError::TooManyAttempts {
                retry_after_secs: left.as_secs().max(1),
            });
        }

        match store.unlock(password) {
            Ok(()) => {
                tracking.lockout.record_success();
                tracking.idle.record_activity();
            }
            Err(OtpVaultError::WrongPassword) => {
                tracking.lockout.record_failure(now);
                return Err(OtpVaultError::WrongPassword);
            }
            Err(e) => return Err(e),
        }
        drop(tracking);
        drop(store);

        self.notify(|l| l.on_unlock());
        Ok(())
    }

    /// Lock explicitly. Idempotent.
    pub fn lock(&self) {
        lock_ignoring_poison(&self.store).lock();
        self.notify(|l| l.on_lock(LockReason::Explicit));
    }

    /// React to a platform notification.
    ///
    /// Lock-screen and suspend lock the store when a password is
    /// required, and every listener is told to hide its content. Returns
    /// `true` when the event locked the session.
    pub fn handle_event(&self, event: OsEvent) -> bool {
        let reason = match event {
            OsEvent::LockScreen => LockReason::LockScreen,
            OsEvent::Suspend => LockReason::Suspend,
            OsEvent::Resume => {
                tracing::debug!("resume event");
                return false;
            }
        };

        {
            let mut store = lock_ignoring_poison(&self.store);
            if store.require_password() != Some(true) {
                return false;
            }
            store.lock();
        }

        tracing::info!(?reason, "session locked by system event");
        self.notify(|l| l.on_lock(reason));
        true
    }

    /// Idle check. Locks and notifies when the timeout has passed.
    pub fn tick(&self) -> bool {
        let locked = {
            let mut store = lock_ignoring_poison(&self.store);
            let tracking = lock_ignoring_poison(&self.tracking);
            expire_if_idle(&mut store, &tracking)
        };
        if locked {
            self.notify(|l| l.on_lock(LockReason::Idle));
        }
        locked
    }

    /// Time left before the idle lock; `None` when idle locking is off.
    pub fn idle_remaining(&self) -> Option<Duration> {
        lock_ignoring_poison(&self.tracking).idle.remaining()
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// An expired idle timer locks the store first, so `f` then sees
    /// `Locked` errors from key-requiring operations. The call counts as
    /// activity.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut SecretStore) -> Result<R>) -> Result<R> {
        let (result, idle_locked) = {
            let mut store = lock_ignoring_poison(&self.store);
            let mut tracking = lock_ignoring_poison(&self.tracking);
            let idle_locked = expire_if_idle(&mut store, &tracking);
            tracking.idle.record_activity();
            drop(tracking);
            (f(&mut store), idle_locked)
        };
        if idle_locked {
            self.notify(|l| l.on_lock(LockReason::Idle));
        }
        result
    }

    /// Check a change and wrap it for confirmation.
    ///
    /// Fails early on anything `confirm` would reject: a weak password,
    /// or a locked store for a password change.
    pub fn propose(&self, change: SecurityChange) -> Result<PendingChange> {
        if let SecurityChange::SetPassword(password) = &change {
            policy::check_password(password)?;
        }
        if !matches!(change, SecurityChange::Reset) && self.state() == StoreState::Locked {
            return Err(OtpVaultError::Locked);
        }
        tracing::debug!(?change, "security change proposed");
        Ok(PendingChange { change })
    }

    /// Apply a confirmed change.
    pub fn confirm(&self, pending: PendingChange) -> Result<ChangeOutcome> {
        {
            let mut store = lock_ignoring_poison(&self.store);
            match &pending.change {
                SecurityChange::SetPassword(password) => store.set_password(password)?,
                SecurityChange::DisablePassword => store.disable_password()?,
                SecurityChange::Reset => store.reset()?,
            }
            lock_ignoring_poison(&self.tracking).lockout.record_success();
        }

        if matches!(pending.change, SecurityChange::Reset) {
            self.notify(|l| l.on_lock(LockReason::Explicit));
        }
        tracing::info!(change = ?pending.change, "security change applied");
        Ok(ChangeOutcome {
            restart_required: true,
        })
    }

    /// Re-read the store file at a synchronization point.
    pub fn reload(&self) -> Result<()> {
        lock_ignoring_poison(&self.store).reload()
    }

    fn notify(&self, f: impl Fn(&dyn SessionListener)) {
        let listeners = lock_ignoring_poison(&self.listeners).clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }
}

fn expire_if_idle(store: &mut SecretStore, tracking: &Tracking) -> bool {
    if tracking.idle.expired()
        && store.is_unlocked()
        && store.require_password() == Some(true)
    {
        store.lock();
        tracing::info!("session locked after inactivity");
        true
    } else {
        false
    }
}

/// A panic while holding a lock leaves the data consistent here: every
/// store mutation commits only after its write succeeds.
fn lock_ignoring_poison<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::vault::secret::Secret;

    #[derive(Default)]
    struct Recorder {
        locks: AtomicUsize,
        unlocks: AtomicUsize,
    }

    impl SessionListener for Recorder {
        fn on_lock(&self, _reason: LockReason) {
            self.locks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unlock(&self) {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings() -> Settings {
        Settings {
            argon2_memory_kib: 8_192,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Settings::default()
        }
    }

    fn guard_with(dir: &TempDir, policy: SessionPolicy) -> SessionGuard {
        let store = SecretStore::open(&dir.path().join("otpvault.json"), &settings()).unwrap();
        SessionGuard::new(store, policy)
    }

    fn configure(guard: &SessionGuard, password: &str) {
        let pending = guard
            .propose(SecurityChange::SetPassword(Zeroizing::new(password.into())))
            .unwrap();
        assert!(guard.confirm(pending).unwrap().restart_required);
    }

    #[test]
    fn lock_screen_locks_and_notifies() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(&dir, SessionPolicy::default());
        let recorder = Arc::new(Recorder::default());
        guard.add_listener(recorder.clone());

        configure(&guard, "correct-password");
        assert_eq!(guard.state(), StoreState::Unlocked);

        assert!(guard.handle_event(OsEvent::LockScreen));
        assert_eq!(guard.state(), StoreState::Locked);
        assert_eq!(recorder.locks.load(Ordering::SeqCst), 1);
        assert!(matches!(
            guard.with_store(|s| s.export_all()),
            Err(OtpVaultError::Locked)
        ));

        assert!(!guard.handle_event(OsEvent::Resume));
        assert_eq!(guard.state(), StoreState::Locked);
    }

    #[test]
    fn lock_screen_ignored_without_password() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(&dir, SessionPolicy::default());
        let pending = guard.propose(SecurityChange::DisablePassword).unwrap();
        guard.confirm(pending).unwrap();

        assert!(!guard.handle_event(OsEvent::Suspend));
        assert_eq!(guard.state(), StoreState::Unlocked);
    }

    #[test]
    fn wrong_password_then_backoff() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(
            &dir,
            SessionPolicy {
                idle_timeout: None,
                lockout: LockoutPolicy {
                    max_attempts: 2,
                    base: Duration::from_secs(60),
                },
            },
        );
        configure(&guard, "correct-password");
        guard.lock();

        assert!(matches!(guard.unlock("wrong"), Err(OtpVaultError::WrongPassword)));
        assert_eq!(guard.state(), StoreState::Locked);
        assert!(matches!(guard.unlock("wrong"), Err(OtpVaultError::WrongPassword)));

        // Blocked even with the right password.
        assert!(matches!(
            guard.unlock("correct-password"),
            Err(OtpVaultError::TooManyAttempts { .. })
        ));
        assert_eq!(guard.state(), StoreState::Locked);
    }

    #[test]
    fn idle_timeout_locks() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(
            &dir,
            SessionPolicy {
                idle_timeout: Some(Duration::from_millis(50)),
                lockout: LockoutPolicy::default(),
            },
        );
        configure(&guard, "correct-password");
        guard.unlock("correct-password").unwrap();
        assert!(!guard.tick());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(guard.idle_remaining(), Some(Duration::ZERO));
        assert!(guard.tick());
        assert_eq!(guard.state(), StoreState::Locked);
    }

    #[test]
    fn idle_remaining_tracks_activity() {
        let dir = TempDir::new().unwrap();
        let off = guard_with(&dir, SessionPolicy::default());
        assert_eq!(off.idle_remaining(), None);
        drop(off);

        let guard = guard_with(
            &dir,
            SessionPolicy {
                idle_timeout: Some(Duration::from_secs(600)),
                lockout: LockoutPolicy::default(),
            },
        );
        let remaining = guard.idle_remaining().unwrap();
        assert!(remaining > Duration::from_secs(590) && remaining <= Duration::from_secs(600));
    }

    #[test]
    fn propose_rejects_weak_password_and_locked_store() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(&dir, SessionPolicy::default());
        assert!(matches!(
            guard.propose(SecurityChange::SetPassword(Zeroizing::new("short".into()))),
            Err(OtpVaultError::WeakPassword(_))
        ));

        configure(&guard, "correct-password");
        guard.lock();
        assert!(matches!(
            guard.propose(SecurityChange::DisablePassword),
            Err(OtpVaultError::Locked)
        ));
        assert!(guard.propose(SecurityChange::Reset).is_ok());
    }

    #[test]
    fn reset_returns_to_unconfigured() {
        let dir = TempDir::new().unwrap();
        let guard = guard_with(&dir, SessionPolicy::default());
        configure(&guard, "correct-password");
        guard
            .with_store(|s| s.add_secrets(vec![Secret::totp("a", "", "JBSWY3DPEHPK3PXP")]))
            .unwrap();

        let pending = guard.propose(SecurityChange::Reset).unwrap();
        let outcome = guard.confirm(pending).unwrap();
        assert!(outcome.restart_required);
        assert_eq!(guard.state(), StoreState::Unconfigured);
    }

    #[test]
    fn concurrent_lock_events_and_reads_do_not_deadlock() {
        let dir = TempDir::new().unwrap();
        let guard = Arc::new(guard_with(&dir, SessionPolicy::default()));
        let pending = guard.propose(SecurityChange::DisablePassword).unwrap();
        guard.confirm(pending).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if i % 2 == 0 {
                            guard.handle_event(OsEvent::LockScreen);
                        } else {
                            guard.with_store(|s| s.export_all()).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(guard.state(), StoreState::Unlocked);
    }
}
