//! Pipeline stages for scanned-PDF conversion.
//!
//! Each submodule implements exactly one transformation step. The four
//! external capabilities are traits, so any of them can be replaced (a
//! different OCR engine, a stub corrector in tests) without touching the
//! orchestrator in [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ recognize ──▶ text ──▶ correct ──▶ assemble
//! (%PDF)    (pdfium)      (per page)    (lines)  (remote)    (docx/txt)
//! ```
//!
//! 1. [`input`]    : validate the source file before any work
//! 2. [`rasterize`]: all selected pages to PNG in one blocking call
//! 3. [`recognize`]: one page image → raw text ([`vision`] is an LLM
//!    alternative to tesseract, using [`encode`] for the image payload)
//! 4. [`text`]     : normalise raw text into trimmed, non-empty lines
//! 5. [`correct`]  : one remote call for the whole text, edits applied in
//!    descending offset order
//! 6. [`assemble`] : corrected lines → output document bytes

pub mod assemble;
pub mod correct;
pub mod encode;
pub mod input;
pub mod rasterize;
pub mod recognize;
pub mod text;
pub mod vision;
