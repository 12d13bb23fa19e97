//! Acceptance rules for a new store password.

use crate::errors::{OtpVaultError, Result};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 64;

/// Frequently leaked passwords long enough to pass the length check.
/// Compared case-insensitively.
const COMMON_PASSWORDS: &[&str] = &[
    "12345678",
    "123456789",
    "1234567890",
    "11111111",
    "00000000",
    "87654321",
    "12341234",
    "11223344",
    "password",
    "password1",
    "password12",
    "password123",
    "passw0rd",
    "p@ssw0rd",
    "iloveyou",
    "princess",
    "sunshine",
    "football",
    "baseball",
    "superman",
    "starwars",
    "whatever",
    "trustno1",
    "qwertyuiop",
    "qwerty123",
    "qwertyui",
    "1q2w3e4r",
    "1qaz2wsx",
    "zaq12wsx",
    "asdfghjkl",
    "abcd1234",
    "abc12345",
    "letmein1",
    "welcome1",
    "computer",
    "michelle",
    "jennifer",
    "corvette",
    "mercedes",
    "internet",
    "changeme",
    "admin123",
    "administrator",
];

/// Reject passwords outside 8..=64 characters or on the common list.
pub fn check_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(OtpVaultError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(OtpVaultError::WeakPassword(format!(
            "must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(OtpVaultError::WeakPassword(
            "this is one of the most common passwords".into(),
        ));
    }

    Ok(())
}
