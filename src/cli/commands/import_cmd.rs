//! `otpvault import` — add secrets from QR screenshots and text files.
//!
//! Each file is a separate source. PNG/JPEG files are scanned for QR
//! codes; anything else is read as text (otpauth URIs, one per line, or
//! export blocks). Sources that fail are reported, the rest are merged
//! in the order given.

use std::path::PathBuf;

use crate::cli::output;
use crate::cli::{audit, unlocked_session, Cli};
use crate::errors::{OtpVaultError, Result};
use crate::import::{start_import, ImportSource};

/// Execute the `import` command.
pub fn execute(cli: &Cli, files: &[PathBuf], text: Option<&PathBuf>) -> Result<()> {
    let mut sources: Vec<ImportSource> = files.iter().cloned().map(ImportSource::File).collect();
    if let Some(path) = text {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OtpVaultError::CommandFailed(format!("cannot read {}: {e}", path.display()))
        })?;
        sources.push(ImportSource::Text(content));
    }

    if sources.is_empty() {
        return Err(OtpVaultError::CommandFailed(
            "nothing to import — pass image files or --text FILE".into(),
        ));
    }

    let (session, dir) = unlocked_session(cli)?;
    let result = session.with_store(|store| start_import(sources, store));

    let summary = match result {
        Ok(summary) => summary,
        Err(OtpVaultError::NothingImported { failures }) => {
            for failure in &failures {
                output::warning(&failure.to_string());
            }
            audit(&dir, "import", None, Some(&format!("0 added, {} failed", failures.len())));
            return Err(OtpVaultError::NothingImported { failures });
        }
        Err(e) => return Err(e),
    };

    for (secret, id) in summary.added.iter().zip(&summary.ids) {
        let label = if secret.issuer.is_empty() {
            secret.name.clone()
        } else {
            format!("{} ({})", secret.name, secret.issuer)
        };
        output::info(&format!("  + {label}  [{}]", output::short_id(id)));
    }
    for failure in &summary.failed {
        output::warning(&failure.to_string());
    }
    if summary.skipped > 0 {
        output::warning(&format!(
            "Skipped {} exported account(s) without a name or key",
            summary.skipped
        ));
    }

    audit(
        &dir,
        "import",
        None,
        Some(&format!(
            "{} added, {} failed",
            summary.added.len(),
            summary.failed.len()
        )),
    );

    output::success(&format!("Imported {} secret(s)", summary.added.len()));
    Ok(())
}
