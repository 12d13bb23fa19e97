//! Import module — getting secrets in from QR codes and text.
//!
//! - `qr`: image → text payload
//! - `uri`: text payload → `Secret`s (otpauth and migration URIs)
//! - `text`: the `Name:/Secret:/Issuer:/Type:` block format
//! - `pipeline`: batch orchestration and the merge into the store

pub mod pipeline;
pub mod qr;
pub mod text;
pub mod uri;

pub use pipeline::{
    start_import, CancelHandle, ImportBatch, ImportFailure, ImportSource, ImportState,
    ImportSummary,
};
pub use uri::{build_otpauth_uri, normalize, normalize_report, NormalizeReport};
