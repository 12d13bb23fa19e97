//! `otpvault audit` — display the audit log.
//!
//! Usage:
//!   otpvault audit               # show last 50 entries
//!   otpvault audit --last 20     # show last 20
//!   otpvault audit --since 7d    # entries from last 7 days

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditEntry, AuditLog};
use crate::cli::output;
use crate::cli::{data_dir, Cli};
use crate::errors::{OtpVaultError, Result};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let dir = data_dir(cli)?;
    if !AuditLog::db_path(&dir).exists() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let audit = AuditLog::open(&dir)
        .ok_or_else(|| OtpVaultError::AuditError("failed to open audit database".into()))?;

    let since = since.map(|s| since_cutoff(s, Utc::now())).transpose()?;
    let entries = audit.query(last, since)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);
    Ok(())
}

/// Turn "7d", "24h" or "30m" into the instant that long before `now`.
fn since_cutoff(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        OtpVaultError::CommandFailed(format!(
            "invalid duration '{input}' — use format like 7d, 24h, or 30m"
        ))
    };

    let (split, _) = input.char_indices().last().ok_or_else(invalid)?;
    let (num, unit) = input.split_at(split);
    let num: i64 = num.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "d" => chrono::Duration::try_days(num),
        "h" => chrono::Duration::try_hours(num),
        "m" => chrono::Duration::try_minutes(num),
        _ => None,
    };
    duration
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(invalid)
}

fn print_audit_table(entries: &[AuditEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Secret", "Details"]);

    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_operation(&entry.operation),
            entry.secret_id.as_deref().unwrap_or("-").to_string(),
            entry.details.as_deref().unwrap_or("-").to_string(),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

fn colorize_operation(op: &str) -> String {
    match op {
        "init" | "enable-password" => style(op).green().to_string(),
        "add" | "import" => style(op).blue().to_string(),
        "remove" | "reset" => style(op).red().to_string(),
        "passwd" | "disable-password" => style(op).yellow().to_string(),
        "export" => style(op).cyan().to_string(),
        _ => op.to_string(),
    }
}
