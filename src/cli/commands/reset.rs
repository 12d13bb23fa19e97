//! `otpvault reset` — wipe the store.
//!
//! Needs no password: a forgotten password is exactly when reset is used.

use crate::cli::output;
use crate::cli::{audit, confirm, data_dir, open_session, Cli};
use crate::errors::Result;
use crate::session::SecurityChange;

/// Execute the `reset` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let dir = data_dir(cli)?;
    let session = open_session(&dir)?;

    let count = session.with_store(|store| Ok(store.len()))?;
    let pending = session.propose(SecurityChange::Reset)?;
    output::warning(pending.summary());

    if !confirm(
        &format!("Permanently delete {count} secret(s) and the password?"),
        force,
    )? {
        output::info("Cancelled.");
        return Ok(());
    }

    session.confirm(pending)?;
    audit(&dir, "reset", None, Some(&format!("{count} secrets deleted")));
    output::success("Store reset");
    output::tip("Run `otpvault init` to set it up again.");

    Ok(())
}
