//! # scan2docx
//!
//! Turn scanned, image-only PDFs into editable documents.
//!
//! A scanned PDF has no text layer, so nothing can be extracted directly.
//! This crate rasterises every page, runs text recognition on each image,
//! sends the collected text once to a grammar-correction service, and
//! writes the corrected lines into a `.docx` (or plain text) file. A small
//! SQLite store tracks users, jobs and per-file status, with a versioned
//! migration engine that runs before anything else touches it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scan.pdf
//!  │
//!  ├─ 1. Check      (pdf, docx|txt) against the capability table
//!  ├─ 2. Validate   file exists and starts with %PDF
//!  ├─ 3. Rasterise  all pages → page-0001.png … in a per-file scratch dir
//!  ├─ 4. Recognise  each page in order (tesseract or a vision LLM)
//!  ├─ 5. Correct    one LanguageTool request, edits applied high→low offset
//!  └─ 6. Reassemble one paragraph per line, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2docx::{convert, ConversionConfig, ConversionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let request = ConversionRequest::new("scan.pdf", "out/scan.docx");
//!     let output = convert(&request, &config).await?;
//!     eprintln!("{} lines, {} edits",
//!         output.stats.line_count,
//!         output.stats.edits_applied);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod convert;
pub mod error;
pub mod jobs;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scratch;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, CorrectionPolicy, PageFailurePolicy,
    PageSelection, RecognizerKind, StoreConfig,
};
pub use convert::{convert, convert_sync, ConversionRequest};
pub use error::{ConvertError, ErrorKind, PageError, StoreError};
pub use jobs::{run_job, JobLayout, JobReport};
pub use output::{ConversionOutput, ConversionStats, PageResult};
pub use pipeline::assemble::Reassembler;
pub use pipeline::correct::{apply_edits, Corrector, Edit};
pub use pipeline::rasterize::Rasterizer;
pub use pipeline::recognize::Recognizer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{FileStatus, JobStatus, MigrationReport, NewFile, Store};
