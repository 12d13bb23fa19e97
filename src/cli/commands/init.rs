//! `otpvault init` — configure a new store.
//!
//! Either choose a password (the data key is wrapped with an Argon2id
//! derived key) or run without one (`--no-password`, data key on disk).

use crate::cli::output;
use crate::cli::{audit, data_dir, open_session, prompt_new_password, Cli};
use crate::errors::{OtpVaultError, Result};
use crate::session::SecurityChange;
use crate::vault::StoreState;

/// Execute the `init` command.
pub fn execute(cli: &Cli, no_password: bool) -> Result<()> {
    let dir = data_dir(cli)?;
    let session = open_session(&dir)?;

    if session.state() != StoreState::Unconfigured {
        output::tip("Use `otpvault passwd` to change the password, or `otpvault reset` to start over.");
        return Err(OtpVaultError::AlreadyConfigured);
    }

    let change = if no_password {
        SecurityChange::DisablePassword
    } else {
        SecurityChange::SetPassword(prompt_new_password()?)
    };
    let pending = session.propose(change)?;
    session.confirm(pending)?;

    let path = session.with_store(|store| Ok(store.path().to_path_buf()))?;
    if no_password {
        audit(&dir, "init", None, Some("no password"));
        output::success(&format!("Store created at {}", path.display()));
        output::warning("No password set: anyone with access to this account can read your codes.");
    } else {
        audit(&dir, "init", None, Some("password protected"));
        output::success(&format!(
            "Password-protected store created at {}",
            path.display()
        ));
    }

    output::tip("Run `otpvault import <screenshot.png>` to add secrets from a QR code.");
    output::tip("Run `otpvault codes` to see your current codes.");

    Ok(())
}
