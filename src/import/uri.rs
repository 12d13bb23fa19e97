//! Turn a decoded text payload into `Secret` records.
//!
//! Two payload shapes are accepted, told apart by their scheme:
//!
//! - `otpauth://totp/…` / `otpauth://hotp/…`: a single key URI in the
//!   Google Authenticator key-URI format. Always one secret.
//! - `otpauth-migration://offline?data=…`: a Google Authenticator bulk
//!   export. `data` is base64 of a protobuf `MigrationPayload`; every
//!   `OtpParameters` inside becomes one TOTP secret with standard
//!   digits, period and algorithm.
//!
//! Anything else is `ParseError::UnknownFormat`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::errors::ParseError;
use crate::vault::secret::{
    encode_base32, is_valid_base32, normalize_base32, Algorithm, OtpType, Secret, DEFAULT_DIGITS,
    DEFAULT_PERIOD,
};

const KEY_URI_SCHEME: &str = "otpauth";
const MIGRATION_SCHEME: &str = "otpauth-migration";

/// Secrets found in one payload plus the count of bulk-export entries
/// that were dropped for lacking a name or key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub secrets: Vec<Secret>,
    pub skipped: usize,
}

/// Parse a payload into secrets.
pub fn normalize(payload: &str) -> Result<Vec<Secret>, ParseError> {
    normalize_report(payload).map(|report| report.secrets)
}

/// Parse a payload into secrets, also reporting skipped entries.
pub fn normalize_report(payload: &str) -> Result<NormalizeReport, ParseError> {
    let payload = payload.trim();
    let scheme = payload
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        Some(MIGRATION_SCHEME) => parse_migration(payload),
        Some(KEY_URI_SCHEME) => parse_key_uri(payload).map(|secret| NormalizeReport {
            secrets: vec![secret],
            skipped: 0,
        }),
        _ => Err(ParseError::UnknownFormat),
    }
}

/// Render a secret as an `otpauth://` key URI.
///
/// Only non-default parameters besides `secret` and `issuer` are emitted.
pub fn build_otpauth_uri(secret: &Secret) -> String {
    let label = if secret.issuer.is_empty() {
        escape_label(&secret.name)
    } else {
        format!("{}:{}", escape_label(&secret.issuer), escape_label(&secret.name))
    };

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("secret", &secret.secret);
    if !secret.issuer.is_empty() {
        query.append_pair("issuer", &secret.issuer);
    }
    if secret.algorithm != Algorithm::Sha1 {
        query.append_pair("algorithm", secret.algorithm.uri_name());
    }
    if secret.digits != DEFAULT_DIGITS {
        query.append_pair("digits", &secret.digits.to_string());
    }
    match secret.otp_type {
        OtpType::Totp if secret.period != DEFAULT_PERIOD => {
            query.append_pair("period", &secret.period.to_string());
        }
        OtpType::Hotp => {
            query.append_pair("counter", &secret.counter.to_string());
        }
        OtpType::Totp => {}
    }

    format!("otpauth://{}/{}?{}", secret.otp_type, label, query.finish())
}

// ---------------------------------------------------------------------------
// otpauth:// key URIs
// ---------------------------------------------------------------------------

fn parse_key_uri(payload: &str) -> Result<Secret, ParseError> {
    let url = Url::parse(payload).map_err(|_| ParseError::UnknownFormat)?;

    let otp_type = match url.host_str().map(str::to_ascii_lowercase).as_deref() {
        Some("totp") => OtpType::Totp,
        Some("hotp") => OtpType::Hotp,
        _ => return Err(ParseError::UnknownFormat),
    };

    // Label is "/issuer:account" or "/account", percent-encoded.
    let label = percent_decode_str(url.path().trim_start_matches('/'))
        .decode_utf8_lossy()
        .into_owned();
    let (label_issuer, account) = match label.split_once(':') {
        Some((issuer, account)) => (issuer.trim().to_string(), account.trim().to_string()),
        None => (String::new(), label.trim().to_string()),
    };

    let mut secret = None;
    let mut issuer = None;
    let mut algorithm = Algorithm::Sha1;
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0u64;

    for (key, value) in url.query_pairs() {
        match key.to_ascii_lowercase().as_str() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => issuer = Some(value.trim().to_string()),
            "algorithm" => algorithm = value.parse().unwrap_or_default(),
            "digits" => {
                digits = value
                    .parse()
                    .ok()
                    .filter(|d| (6..=8).contains(d))
                    .unwrap_or(DEFAULT_DIGITS)
            }
            "period" => {
                period = value
                    .parse()
                    .ok()
                    .filter(|p| *p > 0)
                    .unwrap_or(DEFAULT_PERIOD)
            }
            "counter" => counter = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    let secret = secret
        .filter(|s| is_valid_base32(s))
        .map(|s| normalize_base32(&s))
        .ok_or(ParseError::MissingSecret)?;

    // An explicit issuer parameter beats the label prefix.
    let issuer = issuer
        .filter(|i| !i.is_empty())
        .unwrap_or(label_issuer);
    let name = if account.is_empty() {
        issuer.clone()
    } else {
        account
    };
    if name.is_empty() {
        return Err(ParseError::UnknownFormat);
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

/// Label characters left unescaped in built URIs.
const LABEL: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'@')
    .remove(b'+');

fn escape_label(part: &str) -> String {
    utf8_percent_encode(part, LABEL).to_string()
}

// ---------------------------------------------------------------------------
// otpauth-migration:// bulk exports
// ---------------------------------------------------------------------------

fn parse_migration(payload: &str) -> Result<NormalizeReport, ParseError> {
    let url = Url::parse(payload)
        .map_err(|e| ParseError::MalformedExport(format!("invalid URI: {e}")))?;

    let data = url
        .query_pairs()
        .find(|(key, _)| key == "data")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| ParseError::MalformedExport("missing `data` parameter".into()))?;

    // A raw '+' in the query decodes to a space.
    let data = data.replace(' ', "+");
    let bytes = STANDARD_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| ParseError::MalformedExport(format!("base64: {e}")))?;

    let mut report = NormalizeReport::default();
    for entry in read_payload(&bytes)? {
        match entry_to_secret(entry) {
            Some(secret) => report.secrets.push(secret),
            None => report.skipped += 1,
        }
    }

    tracing::debug!(
        imported = report.secrets.len(),
        skipped = report.skipped,
        "migration payload parsed"
    );
    Ok(report)
}

/// Raw fields of one `OtpParameters` message.
#[derive(Default)]
struct MigrationEntry {
    secret: Vec<u8>,
    name: String,
    issuer: String,
}

/// Walk the outer `MigrationPayload`. Field 1 is a repeated embedded
/// `OtpParameters`; all other fields (version, batch info) are skipped.
/// An entry whose own framing is broken yields `None` and is counted as
/// skipped by the caller.
fn read_payload(data: &[u8]) -> Result<Vec<Option<MigrationEntry>>, ParseError> {
    let mut reader = WireReader::new(data);
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let (field, value) = reader
            .field()
            .ok_or_else(|| ParseError::MalformedExport("truncated protobuf".into()))?;
        if let (1, WireValue::Bytes(message)) = (field, value) {
            entries.push(read_otp_parameters(message));
        }
    }

    Ok(entries)
}

/// `OtpParameters`: 1 secret (bytes), 2 name, 3 issuer. Algorithm,
/// digits, type and counter (fields 4 to 7) are ignored; bulk-export
/// entries are always standard TOTP.
fn read_otp_parameters(data: &[u8]) -> Option<MigrationEntry> {
    let mut reader = WireReader::new(data);
    let mut entry = MigrationEntry::default();

    while !reader.is_empty() {
        match reader.field()? {
            (1, WireValue::Bytes(b)) => entry.secret = b.to_vec(),
            (2, WireValue::Bytes(b)) => entry.name = String::from_utf8_lossy(b).into_owned(),
            (3, WireValue::Bytes(b)) => entry.issuer = String::from_utf8_lossy(b).into_owned(),
            _ => {}
        }
    }

    Some(entry)
}

fn entry_to_secret(entry: Option<MigrationEntry>) -> Option<Secret> {
    let entry = entry?;
    if entry.secret.is_empty() {
        return None;
    }

    let mut issuer = entry.issuer.trim().to_string();
    let mut name = entry.name.trim().to_string();

    // Names are often exported as "Issuer:account".
    if let Some((prefix, account)) = name.split_once(':') {
        let (prefix, account) = (prefix.trim().to_string(), account.trim().to_string());
        if issuer.is_empty() {
            issuer = prefix;
            name = account;
        } else if prefix == issuer {
            name = account;
        }
    }

    if name.is_empty() {
        return None;
    }

    Some(Secret::totp(&name, &issuer, &encode_base32(&entry.secret)))
}

// ---------------------------------------------------------------------------
// Minimal protobuf wire-format reader
// ---------------------------------------------------------------------------

enum WireValue<'a> {
    Varint,
    Fixed,
    Bytes(&'a [u8]),
}

struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn varint(&mut self) -> Option<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        None
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    /// Read one `(field number, value)` pair; `None` on broken framing.
    fn field(&mut self) -> Option<(u64, WireValue<'a>)> {
        let tag = self.varint()?;
        let value = match tag & 0x07 {
            0 => {
                self.varint()?;
                WireValue::Varint
            }
            1 => {
                self.take(8)?;
                WireValue::Fixed
            }
            2 => {
                let len = usize::try_from(self.varint()?).ok()?;
                WireValue::Bytes(self.take(len)?)
            }
            5 => {
                self.take(4)?;
                WireValue::Fixed
            }
            _ => return None,
        };
        Some((tag >> 3, value))
    }
}
