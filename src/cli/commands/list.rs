//! `otpvault list` and `otpvault codes` — show what is stored.

use crate::cli::output;
use crate::cli::{unlocked_session, Cli};
use crate::errors::Result;
use crate::otp;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (session, _) = unlocked_session(cli)?;
    let secrets = session.with_store(|store| store.list())?;

    output::info(&format!("{} secret(s)", secrets.len()));
    output::print_secrets_table(&secrets);

    Ok(())
}

/// Execute the `codes` command.
pub fn execute_codes(cli: &Cli) -> Result<()> {
    let (session, _) = unlocked_session(cli)?;

    let rows = session.with_store(|store| {
        store
            .list()?
            .into_iter()
            .map(|summary| {
                let code = otp::current_code(&store.get(&summary.id)?)?;
                Ok((summary, code))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    output::print_codes_table(&rows);
    Ok(())
}
