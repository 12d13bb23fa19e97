//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::otp::Code;
use crate::vault::SecretSummary;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Ids are shown shortened; `remove` accepts any unique prefix.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Print a table of stored secrets (Id, Name, Issuer, Type, Added).
pub fn print_secrets_table(secrets: &[SecretSummary]) {
    if secrets.is_empty() {
        info("No secrets stored yet.");
        tip("Run `otpvault import <screenshot.png>` or `otpvault add <NAME>`.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Issuer", "Type", "Added"]);

    for s in secrets {
        table.add_row(vec![
            short_id(&s.id),
            s.name.clone(),
            s.issuer.clone(),
            s.otp_type.to_string(),
            s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

/// Print the current code for each secret, with the seconds left for TOTP.
pub fn print_codes_table(rows: &[(SecretSummary, Code)]) {
    if rows.is_empty() {
        info("No secrets stored yet.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Issuer", "Name", "Code", "Expires"]);

    for (summary, code) in rows {
        let expires = match code.remaining_secs {
            Some(secs) => format!("{secs}s"),
            None => "-".to_string(),
        };
        table.add_row(vec![
            summary.issuer.clone(),
            summary.name.clone(),
            style(group_digits(&code.code)).bold().to_string(),
            expires,
        ]);
    }

    println!("{table}");
}

/// "123456" -> "123 456", "12345678" -> "1234 5678".
fn group_digits(code: &str) -> String {
    let mid = code.len() / 2;
    if code.len() < 6 || !code.is_char_boundary(mid) {
        return code.to_string();
    }
    format!("{} {}", &code[..mid], &code[mid..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_codes_in_halves() {
        assert_eq!(group_digits("123456"), "123 456");
        assert_eq!(group_digits("12345678"), "1234 5678");
        assert_eq!(group_digits("1234567"), "123 4567");
        assert_eq!(group_digits("12"), "12");
    }

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = uuid::Uuid::new_v4();
        let short = short_id(&id);
        assert_eq!(short.len(), 8);
        assert!(id.simple().to_string().starts_with(&short));
    }
}
