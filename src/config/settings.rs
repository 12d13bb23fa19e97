use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::Argon2Params;
use crate::errors::{OtpVaultError, Result};

/// Install-level configuration, loaded from `<data_dir>/otpvault.toml`.
///
/// Every field has a sensible default so OtpVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// File name of the store document inside the data directory.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Lock after this many minutes without activity. 0 disables it.
    #[serde(default)]
    pub idle_lock_minutes: u64,

    /// Consecutive failed unlocks allowed before backoff starts.
    #[serde(default = "default_lockout_max_attempts")]
    pub lockout_max_attempts: u32,

    /// First backoff delay in seconds; doubles with every further failure.
    #[serde(default = "default_lockout_base_seconds")]
    pub lockout_base_seconds: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_store_file() -> String {
    "otpvault.json".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_lockout_max_attempts() -> u32 {
    5
}

fn default_lockout_base_seconds() -> u64 {
    30
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            idle_lock_minutes: 0,
            lockout_max_attempts: default_lockout_max_attempts(),
            lockout_base_seconds: default_lockout_base_seconds(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the data directory.
    const FILE_NAME: &'static str = "otpvault.toml";

    /// Load settings from `<data_dir>/otpvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            OtpVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Full path to the store document, e.g. `~/.otpvault/otpvault.json`.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.store_file)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Idle timeout, or `None` when idle locking is off.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_lock_minutes > 0)
            .then(|| Duration::from_secs(self.idle_lock_minutes.saturating_mul(60)))
    }
}

/// Resolve the data directory: explicit flag, then `OTPVAULT_DIR`,
/// then `$HOME/.otpvault` (`%APPDATA%\otpvault` on Windows).
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os("OTPVAULT_DIR").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(windows)]
    let base = std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("otpvault"));
    #[cfg(not(windows))]
    let base = std::env::var_os("HOME").map(|p| PathBuf::from(p).join(".otpvault"));

    base.ok_or_else(|| {
        OtpVaultError::ConfigError("cannot determine data directory; pass --data-dir".into())
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.store_file, "otpvault.json");
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
        assert_eq!(s.idle_timeout(), None);
        assert_eq!(s.lockout_max_attempts, 5);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
store_file = "codes.json"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
idle_lock_minutes = 10
lockout_max_attempts = 3
lockout_base_seconds = 60
"#;
        fs::write(tmp.path().join("otpvault.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.store_file, "codes.json");
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.argon2_parallelism, 8);
        assert_eq!(settings.idle_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(settings.lockout_max_attempts, 3);
        assert_eq!(settings.lockout_base_seconds, 60);
    }

    #[test]
    fn huge_idle_lock_does_not_overflow() {
        let settings = Settings {
            idle_lock_minutes: u64::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.idle_timeout(), Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("otpvault.toml"), "idle_lock_minutes = 5\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.idle_lock_minutes, 5);
        assert_eq!(settings.store_file, "otpvault.json");
        assert_eq!(settings.argon2_iterations, 3);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("otpvault.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn store_path_joins_data_dir() {
        let s = Settings::default();
        assert_eq!(
            s.store_path(Path::new("/home/user/.otpvault")),
            PathBuf::from("/home/user/.otpvault/otpvault.json")
        );
    }

    #[test]
    fn explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/x"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/x"));
    }
}
