//! The plain-text block format written by export and read by text import.
//!
//! ```text
//! Name:   alice@example.com
//! Secret: JBSWY3DPEHPK3PXP
//! Issuer: Example
//! Type:   OTP_TOTP
//! ```
//!
//! Blocks are separated by blank lines. Keys are case-insensitive and
//! values are trimmed. `Digits:`, `Period:`, `Counter:` and `Algorithm:`
//! lines are optional and only written for non-default values.

use std::fmt::Write as _;

use crate::errors::ParseError;
use crate::vault::secret::{
    is_valid_base32, normalize_base32, Algorithm, OtpType, Secret, DEFAULT_DIGITS, DEFAULT_PERIOD,
};

/// Render secrets as text blocks.
pub fn format_blocks(secrets: &[Secret]) -> String {
    let mut out = String::new();
    for (i, secret) in secrets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Name:   {}", secret.name);
        let _ = writeln!(out, "Secret: {}", secret.secret);
        let _ = writeln!(out, "Issuer: {}", secret.issuer);
        let _ = writeln!(out, "Type:   {}", type_tag(secret.otp_type));
        if secret.digits != DEFAULT_DIGITS {
            let _ = writeln!(out, "Digits: {}", secret.digits);
        }
        match secret.otp_type {
            OtpType::Totp if secret.period != DEFAULT_PERIOD => {
                let _ = writeln!(out, "Period: {}", secret.period);
            }
            OtpType::Hotp => {
                let _ = writeln!(out, "Counter: {}", secret.counter);
            }
            OtpType::Totp => {}
        }
        if secret.algorithm != Algorithm::Sha1 {
            let _ = writeln!(out, "Algorithm: {}", secret.algorithm.uri_name());
        }
    }
    out
}

/// Parse text blocks into secrets.
///
/// Every block must carry a valid `Secret:` and a name (an empty `Name:`
/// falls back to the issuer). One bad block fails the whole text.
pub fn parse_blocks(text: &str) -> Result<Vec<Secret>, ParseError> {
    let mut secrets = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                secrets.push(parse_block(&block, secrets.len() + 1)?);
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    if secrets.is_empty() {
        return Err(ParseError::UnknownFormat);
    }
    Ok(secrets)
}

fn parse_block(lines: &[&str], number: usize) -> Result<Secret, ParseError> {
    let malformed = |reason: String| ParseError::MalformedExport(format!("block {number}: {reason}"));

    let mut name = None;
    let mut issuer = String::new();
    let mut secret = None;
    let mut otp_type = OtpType::Totp;
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0;
    let mut algorithm = Algorithm::Sha1;

    for line in lines {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| malformed(format!("expected `Key: value`, got '{}'", line.trim())))?;
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(value.to_string()),
            "issuer" => issuer = value.to_string(),
            "secret" => secret = Some(value.to_string()),
            "type" => {
                otp_type = match value.to_ascii_uppercase().trim_start_matches("OTP_") {
                    "TOTP" => OtpType::Totp,
                    "HOTP" => OtpType::Hotp,
                    _ => return Err(malformed(format!("unknown type '{value}'"))),
                }
            }
            "digits" => {
                digits = value
                    .parse()
                    .ok()
                    .filter(|d| (6..=8).contains(d))
                    .ok_or_else(|| malformed(format!("invalid digits '{value}'")))?
            }
            "period" => {
                period = value
                    .parse()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| malformed(format!("invalid period '{value}'")))?
            }
            "counter" => {
                counter = value
                    .parse()
                    .map_err(|_| malformed(format!("invalid counter '{value}'")))?
            }
            "algorithm" => {
                algorithm = value
                    .parse()
                    .map_err(|_| malformed(format!("invalid algorithm '{value}'")))?
            }
            other => tracing::debug!(key = other, "ignoring unknown key in text import"),
        }
    }

    let secret = secret
        .filter(|s| is_valid_base32(s))
        .map(|s| normalize_base32(&s))
        .ok_or(ParseError::MissingSecret)?;

    let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| issuer.clone());
    if name.is_empty() {
        return Err(malformed("missing name".into()));
    }

    Ok(Secret {
        name,
        issuer,
        secret,
        otp_type,
        digits,
        period,
        counter,
        algorithm,
    }
    .canonical())
}

fn type_tag(otp_type: OtpType) -> &'static str {
    match otp_type {
        OtpType::Totp => "OTP_TOTP",
        OtpType::Hotp => "OTP_HOTP",
    }
}
