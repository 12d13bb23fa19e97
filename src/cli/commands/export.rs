//! `otpvault export` — write every secret in the plain-text block format.
//!
//! The output can be fed back to `otpvault import --text`.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{audit, unlocked_session, Cli};
use crate::errors::Result;
use crate::import::text::format_blocks;

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: Option<&Path>) -> Result<()> {
    let (session, dir) = unlocked_session(cli)?;
    let secrets = session.with_store(|store| store.export_all())?;
    let content = format_blocks(&secrets);

    audit(
        &dir,
        "export",
        None,
        Some(&format!("{} secrets", secrets.len())),
    );

    match output_path {
        Some(path) => {
            fs::write(path, &content)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
            }
            output::success(&format!(
                "Exported {} secret(s) to {}",
                secrets.len(),
                path.display()
            ));
            output::warning("The export file contains your keys in plain text.");
        }
        None => print!("{content}"),
    }

    Ok(())
}
