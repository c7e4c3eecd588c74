//! Single-file conversion: the pipeline orchestrator.
//!
//! [`convert`] drives one source document through the four capabilities in
//! fixed order:
//!
//! ```text
//! capability check ─▶ validate ─▶ scratch dir ─▶ rasterize (once)
//!     ─▶ recognize (page order) ─▶ correct (once) ─▶ reassemble ─▶ write
//! ```
//!
//! It never touches the job store. The caller owns `File.status` and sets it
//! once per terminal state; see [`crate::jobs::run_job`].

use crate::capability::{self, TargetFormat};
use crate::config::{ConversionConfig, CorrectionPolicy, PageFailurePolicy, RecognizerKind};
use crate::error::{ConvertError, PageError};
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::assemble::{self, Reassembler};
use crate::pipeline::correct::{self, Corrector, LanguageToolCorrector};
use crate::pipeline::rasterize::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::recognize::{Recognizer, TesseractRecognizer};
use crate::pipeline::vision::VisionRecognizer;
use crate::pipeline::{input, text};
use crate::scratch::ScratchDir;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One file conversion: where to read, where to write, and as what.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub source_type: String,
    pub destination: PathBuf,
    pub target_type: String,
    /// Prefix for the scratch directory. Jobs pass `job-<id>-file-<id>`;
    /// ad-hoc conversions default to `adhoc`.
    pub scratch_tag: Option<String>,
}

impl ConversionRequest {
    /// Build a request, taking both types from the file extensions.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = destination.into();
        Self {
            source_type: extension_of(&source),
            target_type: extension_of(&destination),
            source,
            destination,
            scratch_tag: None,
        }
    }

    pub fn source_type(mut self, ty: impl Into<String>) -> Self {
        self.source_type = ty.into();
        self
    }

    pub fn target_type(mut self, ty: impl Into<String>) -> Self {
        self.target_type = ty.into();
        self
    }

    pub fn scratch_tag(mut self, tag: impl Into<String>) -> Self {
        self.scratch_tag = Some(tag.into());
        self
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Convert one scanned document.
///
/// On success the destination holds a complete document and the scratch
/// directory has been removed.
///
/// # Errors
/// Every stage failure is terminal for this file; nothing is swallowed.
/// An unsupported type pair is rejected before any file is touched.
pub async fn convert(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();

    // ── Step 1: Capability check ─────────────────────────────────────────
    let format = capability::check(&request.source_type, &request.target_type)?;
    info!(
        "Converting {} ({} → {})",
        request.source.display(),
        request.source_type,
        request.target_type
    );

    // ── Step 2: Validate source ──────────────────────────────────────────
    input::validate_source(&request.source)?;

    // ── Step 3: Resolve capabilities ─────────────────────────────────────
    let rasterizer = resolve_rasterizer(config);
    let recognizer = resolve_recognizer(config)?;
    let corrector = resolve_corrector(config)?;
    let reassembler = resolve_reassembler(config, format);

    // ── Step 4: Isolated scratch directory ───────────────────────────────
    let tag = request.scratch_tag.as_deref().unwrap_or("adhoc");
    let scratch = ScratchDir::create(config.scratch_root.as_deref(), tag)?;

    // ── Step 5: Rasterise all pages in one call ──────────────────────────
    let raster_start = Instant::now();
    let images = rasterizer
        .rasterize(&request.source, scratch.path(), &config.pages)
        .await?;
    let raster_duration_ms = raster_start.elapsed().as_millis() as u64;
    let total_pages = images.len();
    info!("Rasterised {} pages in {}ms", total_pages, raster_duration_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 6: Recognise pages in order ─────────────────────────────────
    let recognition_start = Instant::now();
    let (lines, pages) = recognize_pages(recognizer.as_ref(), &images, config).await?;
    let recognition_duration_ms = recognition_start.elapsed().as_millis() as u64;
    let recognized_pages = pages.iter().filter(|p| p.error.is_none()).count();

    // ── Step 7: Nothing usable means no correction call ──────────────────
    if lines.is_empty() {
        return Err(ConvertError::NoTextRecognized { pages: total_pages });
    }

    // ── Step 8: Correct the whole blob once ──────────────────────────────
    let blob = text::join_lines(&lines);
    let correction_start = Instant::now();
    let (corrected_text, applied, skipped, corrected) =
        match correct_blob(corrector.as_ref(), &blob, config).await {
            Ok(result) => (result.text, result.applied, result.skipped, true),
            Err(e) if config.correction_policy == CorrectionPolicy::BestEffort => {
                warn!("Correction failed, keeping uncorrected text: {}", e);
                (blob, 0, 0, false)
            }
            Err(e) => return Err(e),
        };
    let correction_duration_ms = correction_start.elapsed().as_millis() as u64;

    // ── Step 9: Reassemble ───────────────────────────────────────────────
    let corrected_lines = text::split_lines(&corrected_text);
    let bytes = reassembler
        .assemble(&corrected_lines)
        .map_err(|detail| ConvertError::ReassemblyFailed { detail })?;

    // ── Step 10: Persist atomically ──────────────────────────────────────
    let output_bytes = bytes.len();
    write_atomic(&request.destination, bytes).await?;
    drop(scratch);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, recognized_pages);
    }

    let stats = ConversionStats {
        total_pages,
        recognized_pages,
        failed_pages: total_pages - recognized_pages,
        line_count: corrected_lines.len(),
        edits_applied: applied,
        edits_skipped: skipped,
        corrected,
        output_bytes,
        raster_duration_ms,
        recognition_duration_ms,
        correction_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Wrote {} ({} lines, {} edits) in {}ms",
        request.destination.display(),
        stats.line_count,
        stats.edits_applied,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        destination: request.destination.clone(),
        pages,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(request, config))
}

/// Recognise every page in order under the recognition timeout.
///
/// Returns the collected lines (page order, then line order) and one
/// [`PageResult`] per page. Under `Abort` the first failing page ends the
/// conversion; under `Skip` it is recorded and the next page is tried.
async fn recognize_pages(
    recognizer: &dyn Recognizer,
    images: &[PathBuf],
    config: &ConversionConfig,
) -> Result<(Vec<String>, Vec<PageResult>), ConvertError> {
    let total = images.len();
    let timeout = config.recognition_timeout();
    let mut lines = Vec::new();
    let mut pages = Vec::with_capacity(total);

    for (idx, image) in images.iter().enumerate() {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total);
        }
        let start = Instant::now();

        let outcome = match tokio::time::timeout(timeout, recognizer.recognize(image)).await {
            Ok(Ok(raw)) => Ok(text::collect_lines(&raw)),
            Ok(Err(detail)) => Err(PageError::RecognitionFailed {
                page: page_num,
                detail,
            }),
            Err(_) => Err(PageError::Timeout {
                page: page_num,
                secs: config.recognition_timeout_secs,
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(page_lines) => {
                debug!("Page {}: {} lines", page_num, page_lines.len());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, total, page_lines.len());
                }
                pages.push(PageResult {
                    page_num,
                    line_count: page_lines.len(),
                    duration_ms,
                    error: None,
                });
                lines.extend(page_lines);
            }
            Err(page_err) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, total, &page_err.to_string());
                }
                match config.page_failure_policy {
                    PageFailurePolicy::Abort => return Err(page_err.into()),
                    PageFailurePolicy::Skip => {
                        warn!("{}; skipping", page_err);
                        pages.push(PageResult {
                            page_num,
                            line_count: 0,
                            duration_ms,
                            error: Some(page_err),
                        });
                    }
                }
            }
        }
    }

    Ok((lines, pages))
}

/// One correction request bounded by the correction timeout.
///
/// Transport errors, bad status, malformed JSON and timeout all become
/// [`ConvertError::CorrectionServiceUnavailable`].
async fn correct_blob(
    corrector: &dyn Corrector,
    blob: &str,
    config: &ConversionConfig,
) -> Result<correct::Corrected, ConvertError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_correction_start(blob.chars().count());
    }

    let edits = match tokio::time::timeout(
        config.correction_timeout(),
        corrector.check(blob, &config.language),
    )
    .await
    {
        Ok(Ok(edits)) => edits,
        Ok(Err(reason)) => return Err(ConvertError::CorrectionServiceUnavailable { reason }),
        Err(_) => {
            return Err(ConvertError::CorrectionServiceUnavailable {
                reason: format!("timed out after {}s", config.correction_timeout_secs),
            })
        }
    };

    let corrected = correct::apply_edits(blob, &edits);
    if corrected.skipped > 0 {
        warn!(
            "Skipped {} overlapping or out-of-range edits",
            corrected.skipped
        );
    }
    debug!("Applied {} edits", corrected.applied);
    Ok(corrected)
}

/// Write to a uniquely named temp file beside `path`, then rename it over
/// the destination. The temp file is removed if anything fails.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), ConvertError> {
    let persist_err = |e: std::io::Error| ConvertError::PersistenceFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    tokio::fs::create_dir_all(&parent).await.map_err(persist_err)?;

    let dest = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".scan2docx-")
            .suffix(".tmp")
            .tempfile_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(persist_err)
}

// ── Capability resolution: overrides win over the named defaults ────────

fn resolve_rasterizer(config: &ConversionConfig) -> Arc<dyn Rasterizer> {
    match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::new(
            config.max_rendered_pixels,
            config.password.clone(),
        )),
    }
}

fn resolve_recognizer(config: &ConversionConfig) -> Result<Arc<dyn Recognizer>, ConvertError> {
    if let Some(ref r) = config.recognizer_override {
        return Ok(Arc::clone(r));
    }
    match config.recognizer {
        RecognizerKind::Tesseract => Ok(Arc::new(TesseractRecognizer::new(
            config.tesseract_language.clone(),
        ))),
        RecognizerKind::Vision => VisionRecognizer::from_config(config)
            .map(|v| Arc::new(v) as Arc<dyn Recognizer>)
            .map_err(ConvertError::InvalidConfig),
    }
}

fn resolve_corrector(config: &ConversionConfig) -> Result<Arc<dyn Corrector>, ConvertError> {
    if let Some(ref c) = config.corrector {
        return Ok(Arc::clone(c));
    }
    LanguageToolCorrector::new(config.corrector_url.clone(), config.correction_timeout())
        .map(|c| Arc::new(c) as Arc<dyn Corrector>)
        .map_err(|reason| ConvertError::CorrectionServiceUnavailable { reason })
}

fn resolve_reassembler(config: &ConversionConfig, format: TargetFormat) -> Arc<dyn Reassembler> {
    match config.reassembler {
        Some(ref r) => Arc::clone(r),
        None => assemble::for_target(format),
    }
}
