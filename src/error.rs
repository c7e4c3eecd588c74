//! Error types for the scan2docx library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal for one file**: the conversion of a single
//!   source document cannot produce an output (unsupported pair, unreadable
//!   PDF, nothing recognised, correction service down, destination not
//!   writable). Returned as `Err(ConvertError)` from [`crate::convert()`].
//!
//! * [`PageError`]: **Non-fatal**: a single page failed recognition while
//!   the page-failure policy is [`crate::config::PageFailurePolicy::Skip`].
//!   Stored inside [`crate::output::PageResult`] so callers can see which
//!   pages are missing from an otherwise successful document.
//!
//! * [`StoreError`]: the job/file store or its schema migration failed.
//!   Migration failures are fatal at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a single file conversion.
///
/// Page-level failures under the `Skip` policy use [`PageError`] and are
/// stored in [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The (source, target) pair is not in the capability table.
    #[error("Unsupported conversion: {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The per-conversion scratch directory could not be created.
    #[error("Failed to create scratch directory under '{path}': {source}")]
    ScratchDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rasteriser could not turn the source into page images.
    #[error("Rasterisation of '{path}' failed: {detail}")]
    RasterizationFailed { path: PathBuf, detail: String },

    /// The recogniser failed on a page.
    #[error("Text recognition failed on page {page}: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// The recogniser did not answer within the configured timeout.
    #[error("Text recognition timed out after {secs}s on page {page}")]
    RecognitionTimeout { page: usize, secs: u64 },

    /// Every stage succeeded but no non-empty line was recognised.
    #[error("No text found in scanned PDF ({pages} pages recognised)")]
    NoTextRecognized { pages: usize },

    /// The remote correction service was unreachable, answered with a
    /// non-success status, returned garbage, or timed out.
    #[error("Correction service unavailable: {reason}")]
    CorrectionServiceUnavailable { reason: String },

    /// The reassembler could not encode the output document.
    #[error("Failed to assemble output document: {detail}")]
    ReassemblyFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the destination document.
    #[error("Failed to write output file '{path}': {source}")]
    PersistenceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable classification of a [`ConvertError`], stored next to failed files
/// so the job's owner can be told *why* a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedConversion,
    InvalidSource,
    RasterizationFailed,
    RecognitionFailed,
    NoTextRecognized,
    CorrectionServiceUnavailable,
    ReassemblyFailed,
    PersistenceFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedConversion => "unsupported_conversion",
            ErrorKind::InvalidSource => "invalid_source",
            ErrorKind::RasterizationFailed => "rasterization_failed",
            ErrorKind::RecognitionFailed => "recognition_failed",
            ErrorKind::NoTextRecognized => "no_text_recognized",
            ErrorKind::CorrectionServiceUnavailable => "correction_service_unavailable",
            ErrorKind::ReassemblyFailed => "reassembly_failed",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConvertError {
    /// Classify the error for storage and user-facing reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConvertError::SourceNotFound { .. } | ConvertError::NotAPdf { .. } => {
                ErrorKind::InvalidSource
            }
            ConvertError::RasterizationFailed { .. } => ErrorKind::RasterizationFailed,
            ConvertError::RecognitionFailed { .. } | ConvertError::RecognitionTimeout { .. } => {
                ErrorKind::RecognitionFailed
            }
            ConvertError::NoTextRecognized { .. } => ErrorKind::NoTextRecognized,
            ConvertError::CorrectionServiceUnavailable { .. } => {
                ErrorKind::CorrectionServiceUnavailable
            }
            ConvertError::ReassemblyFailed { .. } => ErrorKind::ReassemblyFailed,
            ConvertError::PersistenceFailed { .. } => ErrorKind::PersistenceFailed,
            ConvertError::ScratchDirFailed { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only the remote correction dependency is worth retrying; every other
    /// failure is either user input or local tooling and will fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConvertError::CorrectionServiceUnavailable { .. })
    }
}

/// A non-fatal error for a single page.
///
/// Only produced under [`crate::config::PageFailurePolicy::Skip`]; with the
/// default `Abort` policy the first page failure becomes a [`ConvertError`].
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The recogniser returned an error.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// The recogniser timed out.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl From<PageError> for ConvertError {
    fn from(e: PageError) -> Self {
        match e {
            PageError::RecognitionFailed { page, detail } => {
                ConvertError::RecognitionFailed { page, detail }
            }
            PageError::Timeout { page, secs } => ConvertError::RecognitionTimeout { page, secs },
        }
    }
}

/// Errors raised by the job/file store and its migration engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A structural change or version bump failed; the store must not be used.
    #[error("Schema migration to version {version} failed: {detail}")]
    MigrationFailed { version: i64, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// SQLite kept another journal mode after the switch to WAL.
    #[error("Store refused WAL journal mode (still '{0}')")]
    JournalMode(String),

    /// The store directory could not be created.
    #[error("Failed to prepare store location '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A status column held a value this version does not understand.
    #[error("Unknown status value '{0}'")]
    InvalidStatus(String),
}
