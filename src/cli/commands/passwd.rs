//! `otpvault passwd` and `otpvault disable-password`.
//!
//! Both re-encrypt every secret under a fresh data key and write the
//! store atomically. Either the whole change lands or none of it does.

use crate::cli::output;
use crate::cli::{audit, confirm, prompt_new_password, unlocked_session, Cli};
use crate::errors::Result;
use crate::session::{ChangeOutcome, SecurityChange};

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (session, dir) = unlocked_session(cli)?;
    let was_protected = session.with_store(|store| Ok(store.require_password() == Some(true)))?;

    output::info("Choose your new store password.");
    let password = prompt_new_password()?;
    let pending = session.propose(SecurityChange::SetPassword(password))?;
    output::info(pending.summary());

    let outcome = session.confirm(pending)?;
    let count = session.with_store(|store| Ok(store.len()))?;

    let op = if was_protected { "passwd" } else { "enable-password" };
    audit(&dir, op, None, Some(&format!("{count} secrets re-encrypted")));
    output::success(&format!("Password set ({count} secrets re-encrypted)"));
    restart_hint(outcome);

    Ok(())
}

/// Execute the `disable-password` command.
pub fn execute_disable(cli: &Cli, force: bool) -> Result<()> {
    let (session, dir) = unlocked_session(cli)?;

    let pending = session.propose(SecurityChange::DisablePassword)?;
    output::warning(pending.summary());
    if !confirm("Disable password protection?", force)? {
        output::info("Cancelled.");
        return Ok(());
    }

    let outcome = session.confirm(pending)?;
    audit(&dir, "disable-password", None, None);
    output::success("Password protection disabled");
    restart_hint(outcome);

    Ok(())
}

fn restart_hint(outcome: ChangeOutcome) {
    if outcome.restart_required {
        output::tip("Restart any other running otpvault session to pick up the change.");
    }
}
