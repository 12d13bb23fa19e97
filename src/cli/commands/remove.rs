//! `otpvault remove` — delete a secret from the store.

use uuid::Uuid;

use crate::cli::output;
use crate::cli::{audit, confirm, unlocked_session, Cli};
use crate::errors::{OtpVaultError, Result};
use crate::vault::SecretSummary;

/// Execute the `remove` command.
pub fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let (session, dir) = unlocked_session(cli)?;

    let summaries = session.with_store(|store| store.list())?;
    let target = resolve_id(&summaries, id)?;

    if !confirm(
        &format!("Remove '{}' ({})?", target.name, target.issuer),
        force,
    )? {
        output::info("Cancelled.");
        return Ok(());
    }

    session.with_store(|store| store.remove_secret(&target.id))?;

    audit(&dir, "remove", Some(&target.id.to_string()), None);
    output::success(&format!("Removed '{}'", target.name));

    Ok(())
}

/// Find the one secret whose id is `input` or starts with it.
fn resolve_id<'a>(summaries: &'a [SecretSummary], input: &str) -> Result<&'a SecretSummary> {
    let needle = input.trim().to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(OtpVaultError::CommandFailed("secret id cannot be empty".into()));
    }

    let mut matches = summaries
        .iter()
        .filter(|s| s.id.simple().to_string().starts_with(&needle));

    match (matches.next(), matches.next()) {
        (Some(found), None) => Ok(found),
        (None, _) => Err(match Uuid::parse_str(input.trim()) {
            Ok(id) => OtpVaultError::NotFound(id),
            Err(_) => OtpVaultError::CommandFailed(format!("no secret with id '{input}'")),
        }),
        (Some(_), Some(_)) => Err(OtpVaultError::CommandFailed(format!(
            "id prefix '{input}' is ambiguous — use more characters"
        ))),
    }
}
