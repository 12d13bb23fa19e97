//! Batch import: decode and normalize many sources, then merge once.
//!
//! ```text
//! Idle -> Decoding -> Normalizing -> Merged | PartialFailure | Cancelled
//! ```
//!
//! Sources are processed independently on scoped worker threads and
//! their results are keyed by source index. The merge is a single
//! `SecretStore::add_secrets` call that walks results in source order,
//! so the resulting order never depends on which worker finished first.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use image::RgbaImage;
use uuid::Uuid;

use super::{qr, text, uri};
use crate::errors::{OtpVaultError, Result};
use crate::vault::secret::Secret;
use crate::vault::store::SecretStore;

/// One input to an import.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// A file on disk: PNG/JPEG images are QR-decoded, anything else is
    /// read as text.
    File(PathBuf),
    /// An already captured bitmap.
    Image(RgbaImage),
    /// Raw text: otpauth URIs (one per line) or export blocks.
    Text(String),
}

impl ImportSource {
    /// Short human-readable identifier used in failure reports.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Image(img) => format!("image {}x{}", img.width(), img.height()),
            Self::Text(_) => "text".to_string(),
        }
    }
}

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    Decoding,
    Normalizing,
    Merged,
    PartialFailure,
    Cancelled,
}

/// A source that produced nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub index: usize,
    pub source: String,
    pub reason: String,
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Outcome of a merged batch.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// Secrets appended, in source order.
    pub added: Vec<Secret>,
    /// Store ids of `added`, index-aligned.
    pub ids: Vec<Uuid>,
    pub failed: Vec<ImportFailure>,
    /// Bulk-export entries dropped for lacking a name or key.
    pub skipped: usize,
}

/// Shared cancellation flag. Cheap to clone and hand to another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-source result after normalization.
#[derive(Debug, Clone)]
enum Decoded {
    Secrets { secrets: Vec<Secret>, skipped: usize },
    Failed(String),
}

/// Intermediate per-source payload between the two phases.
#[derive(Clone)]
enum Payload {
    Uri(String),
    Text(String),
}

/// One import operation over an ordered list of sources.
pub struct ImportBatch {
    sources: Vec<ImportSource>,
    state: ImportState,
    decoded: BTreeMap<usize, Decoded>,
    cancel: CancelHandle,
}

impl ImportBatch {
    pub fn new(sources: Vec<ImportSource>) -> Self {
        Self {
            sources,
            state: ImportState::Idle,
            decoded: BTreeMap::new(),
            cancel: CancelHandle::default(),
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// A handle that can cancel this batch from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the batch. Decoded results are dropped and nothing will be
    /// merged.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.discard();
    }

    /// Decode and normalize every source.
    ///
    /// Per-source problems are recorded, never returned; the only error is
    /// `Cancelled`.
    pub fn run(&mut self) -> Result<()> {
        if self.check_cancelled() {
            return Err(OtpVaultError::Cancelled);
        }

        self.state = ImportState::Decoding;
        tracing::debug!(sources = self.sources.len(), "decoding import sources");
        let payloads = decode_all(&self.sources, &self.cancel);
        if self.check_cancelled() {
            return Err(OtpVaultError::Cancelled);
        }

        self.state = ImportState::Normalizing;
        self.decoded = payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| {
                let decoded = match payload {
                    Ok(payload) => normalize_payload(payload),
                    Err(reason) => Decoded::Failed(reason),
                };
                (index, decoded)
            })
            .collect();

        if self.check_cancelled() {
            return Err(OtpVaultError::Cancelled);
        }
        Ok(())
    }

    /// Append every decoded secret to `store` in one write.
    ///
    /// Runs the batch first if that has not happened yet. With nothing to
    /// add the store is left untouched and every reason is returned in
    /// `NothingImported`.
    pub fn merge_into(&mut self, store: &mut SecretStore) -> Result<ImportSummary> {
        match self.state {
            ImportState::Idle => self.run()?,
            ImportState::Merged => {
                return Err(OtpVaultError::CommandFailed("batch already merged".into()))
            }
            _ => {}
        }
        if self.check_cancelled() {
            return Err(OtpVaultError::Cancelled);
        }

        let mut added = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = 0;
        for (index, decoded) in &self.decoded {
            match decoded {
                Decoded::Secrets {
                    secrets,
                    skipped: s,
                } => {
                    added.extend(secrets.iter().cloned());
                    skipped += s;
                }
                Decoded::Failed(reason) => failed.push(ImportFailure {
                    index: *index,
                    source: self.sources[*index].describe(),
                    reason: reason.clone(),
                }),
            }
        }

        if added.is_empty() {
            self.state = ImportState::PartialFailure;
            tracing::warn!(failed = failed.len(), "import found nothing to add");
            return Err(OtpVaultError::NothingImported { failures: failed });
        }

        let ids = store.add_secrets(added.clone())?;
        self.state = ImportState::Merged;
        self.decoded.clear();

        tracing::info!(
            added = added.len(),
            failed = failed.len(),
            skipped,
            "import merged"
        );
        Ok(ImportSummary {
            added,
            ids,
            failed,
            skipped,
        })
    }

    fn check_cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.discard();
            true
        } else {
            false
        }
    }

    fn discard(&mut self) {
        if self.state != ImportState::Merged {
            self.decoded.clear();
            self.state = ImportState::Cancelled;
        }
    }
}

/// Run a whole import: decode, normalize, merge.
pub fn start_import(sources: Vec<ImportSource>, store: &mut SecretStore) -> Result<ImportSummary> {
    ImportBatch::new(sources).merge_into(store)
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Decode every source on scoped threads, results in source order.
fn decode_all(
    sources: &[ImportSource],
    cancel: &CancelHandle,
) -> Vec<std::result::Result<Payload, String>> {
    if sources.is_empty() {
        return Vec::new();
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(sources.len());
    let chunk_size = sources.len().div_ceil(workers);

    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|source| {
                            if cancel.is_cancelled() {
                                return Err("cancelled".to_string());
                            }
                            isolate(|| decode_source(source))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .zip(sources.chunks(chunk_size))
            .flat_map(|(handle, chunk)| {
                handle.join().unwrap_or_else(|_| {
                    vec![Err("decoder worker panicked".to_string()); chunk.len()]
                })
            })
            .collect()
    })
}

/// Run `f`, turning a panic into a per-source failure.
fn isolate<T>(
    f: impl FnOnce() -> std::result::Result<T, String>,
) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err("decoder panicked".to_string()))
}

fn decode_source(source: &ImportSource) -> std::result::Result<Payload, String> {
    match source {
        ImportSource::Image(img) => qr::decode(img).map(Payload::Uri).map_err(|e| e.to_string()),
        ImportSource::File(path) => {
            if image::ImageFormat::from_path(path).is_ok() {
                qr::decode_file(path)
                    .map(Payload::Uri)
                    .map_err(|e| e.to_string())
            } else {
                std::fs::read_to_string(path)
                    .map(Payload::Text)
                    .map_err(|e| format!("cannot read file: {e}"))
            }
        }
        ImportSource::Text(text) => Ok(Payload::Text(text.clone())),
    }
}

fn normalize_payload(payload: Payload) -> Decoded {
    let result = match payload {
        Payload::Uri(uri) => uri::normalize_report(&uri),
        Payload::Text(text) => normalize_text(&text),
    };
    match result {
        Ok(report) => Decoded::Secrets {
            secrets: report.secrets,
            skipped: report.skipped,
        },
        Err(e) => Decoded::Failed(e.to_string()),
    }
}

/// Text holding otpauth URIs is read line by line; anything else is the
/// block format.
fn normalize_text(
    text: &str,
) -> std::result::Result<uri::NormalizeReport, crate::errors::ParseError> {
    let looks_like_uris = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.to_ascii_lowercase().starts_with("otpauth"));

    if !looks_like_uris {
        return text::parse_blocks(text).map(|secrets| uri::NormalizeReport {
            secrets,
            skipped: 0,
        });
    }

    let mut report = uri::NormalizeReport::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let part = uri::normalize_report(line)?;
        report.secrets.extend(part.secrets);
        report.skipped += part.skipped;
    }
    Ok(report)
}
