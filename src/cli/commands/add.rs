//! `otpvault add` — store a TOTP secret typed in by hand.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{audit, unlocked_session, Cli};
use crate::errors::{OtpVaultError, Result};
use crate::vault::Secret;

/// Execute the `add` command.
pub fn execute(cli: &Cli, name: &str, issuer: &str, secret: Option<&str>) -> Result<()> {
    let (session, dir) = unlocked_session(cli)?;

    let key = match secret {
        Some(s) => Zeroizing::new(s.to_string()),
        None => {
            let s = dialoguer::Password::new()
                .with_prompt(format!("Base32 key for '{name}'"))
                .interact()
                .map_err(|e| OtpVaultError::CommandFailed(format!("secret prompt: {e}")))?;
            Zeroizing::new(s)
        }
    };

    let secret = Secret::totp(name, issuer, &key);
    let ids = session.with_store(|store| store.add_secrets(vec![secret]))?;

    let id = ids.first().map(output::short_id).unwrap_or_default();
    audit(&dir, "add", Some(&id), None);
    output::success(&format!("Added '{name}' [{id}]"));

    Ok(())
}
