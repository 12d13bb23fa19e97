//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use dialoguer::Confirm;
use zeroize::Zeroizing;

use crate::config::{resolve_data_dir, Settings};
use crate::errors::{OtpVaultError, Result};
use crate::session::{SessionGuard, SessionPolicy};
use crate::vault::policy;
use crate::vault::{SecretStore, StoreState};

/// Environment variable consulted before any password prompt.
pub const PASSWORD_ENV: &str = "OTPVAULT_PASSWORD";

/// OtpVault CLI: encrypted two-factor code manager.
#[derive(Parser)]
#[command(
    name = "otpvault",
    about = "Encrypted two-factor authentication code manager",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: $OTPVAULT_DIR or ~/.otpvault)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Configure the store: choose a password, or run without one
    Init {
        /// Keep secrets without a password (key stored on disk)
        #[arg(long)]
        no_password: bool,
    },

    /// Import secrets from QR screenshots, otpauth URIs or export files
    Import {
        /// Image or text files to import
        files: Vec<PathBuf>,

        /// Also import this text file (otpauth lines or export blocks)
        #[arg(long)]
        text: Option<PathBuf>,
    },

    /// Add a TOTP secret by hand
    Add {
        /// Account name (e.g. alice@example.com)
        name: String,

        /// Service the account belongs to
        #[arg(short, long, default_value = "")]
        issuer: String,

        /// Base32 key (omit for a hidden prompt)
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// List stored secrets
    List,

    /// Show the current code for every secret
    Codes,

    /// Remove a secret
    Remove {
        /// Secret id (as shown by `list`; a unique prefix is enough)
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export every secret in the plain-text block format
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Set or change the store password
    Passwd,

    /// Remove password protection
    DisablePassword {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Delete every secret and the security configuration
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// View the audit log of store operations
    #[cfg(feature = "audit-log")]
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the store password: `OTPVAULT_PASSWORD` first, then a hidden prompt.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter store password")
        .interact()
        .map_err(|e| OtpVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation, re-asking until it
/// passes the password policy.
///
/// `OTPVAULT_PASSWORD` is accepted as-is for scripted use, but still has
/// to pass the policy.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        policy::check_password(&pw)?;
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose store password")
            .with_confirmation(
                "Confirm store password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| OtpVaultError::CommandFailed(format!("password prompt: {e}")))?;

        match policy::check_password(&password) {
            Ok(()) => return Ok(Zeroizing::new(password)),
            Err(e) => output::warning(&format!("{e}. Try again.")),
        }
    }
}

fn password_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Ask a yes/no question. `force` answers yes without asking.
pub fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| OtpVaultError::CommandFailed(format!("confirm prompt: {e}")))
}

/// Resolve the data directory from `--data-dir`, `OTPVAULT_DIR` or home.
pub fn data_dir(cli: &Cli) -> Result<PathBuf> {
    resolve_data_dir(cli.data_dir.as_deref())
}

/// Open the store in `data_dir` and wrap it in a session guard.
///
/// The store file is created on first use. Nothing is unlocked yet.
pub fn open_session(data_dir: &Path) -> Result<SessionGuard> {
    std::fs::create_dir_all(data_dir)?;
    let settings = Settings::load(data_dir)?;
    let store = SecretStore::open(&settings.store_path(data_dir), &settings)?;
    Ok(SessionGuard::new(
        store,
        SessionPolicy::from_settings(&settings),
    ))
}

/// Open the store and make sure it is unlocked, prompting if needed.
pub fn unlocked_session(cli: &Cli) -> Result<(SessionGuard, PathBuf)> {
    let dir = data_dir(cli)?;
    let session = open_session(&dir)?;

    match session.state() {
        StoreState::Unconfigured => {
            output::tip("Run `otpvault init` to set up the store.");
            return Err(OtpVaultError::Unconfigured);
        }
        StoreState::Locked => {
            let password = prompt_password()?;
            session.unlock(&password)?;
        }
        StoreState::Unlocked => {}
    }

    Ok((session, dir))
}

/// Record an operation in the audit log when it is compiled in.
pub fn audit(data_dir: &Path, op: &str, secret_id: Option<&str>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    crate::audit::log_audit(data_dir, op, secret_id, details);

    #[cfg(not(feature = "audit-log"))]
    let _ = (data_dir, op, secret_id, details);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_import_with_text_file() {
        let cli = Cli::try_parse_from([
            "otpvault",
            "--data-dir",
            "/tmp/otp",
            "import",
            "a.png",
            "b.png",
            "--text",
            "export.txt",
        ])
        .unwrap();

        assert_eq!(cli.data_dir.as_deref(), Some(Path::new("/tmp/otp")));
        match cli.command {
            Commands::Import { files, text } => {
                assert_eq!(files, [PathBuf::from("a.png"), PathBuf::from("b.png")]);
                assert_eq!(text, Some(PathBuf::from("export.txt")));
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn data_dir_flag_is_global() {
        let cli = Cli::try_parse_from(["otpvault", "list", "--data-dir", "/x"]).unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some(Path::new("/x")));
    }

    #[test]
    fn open_session_creates_unconfigured_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("nested");
        let session = open_session(&data).unwrap();
        assert_eq!(session.state(), StoreState::Unconfigured);
        assert!(data.join("otpvault.json").exists());
    }

    #[test]
    fn confirm_with_force_skips_prompt() {
        assert!(confirm("anything?", true).unwrap());
    }
}
