//! Result types returned by a successful conversion.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a caller learns from one successful file conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Where the output document was written.
    pub destination: PathBuf,
    /// One entry per rasterised page, in page order.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// Recognition outcome for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based position in the rasterised sequence.
    pub page_num: usize,
    /// Non-empty lines this page contributed.
    pub line_count: usize,
    pub duration_ms: u64,
    /// Set only when the page was skipped under the `Skip` policy.
    pub error: Option<PageError>,
}

/// Aggregate numbers for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub recognized_pages: usize,
    pub failed_pages: usize,
    pub line_count: usize,
    pub edits_applied: usize,
    pub edits_skipped: usize,
    /// False when correction failed under the best-effort policy.
    pub corrected: bool,
    pub output_bytes: usize,
    pub raster_duration_ms: u64,
    pub recognition_duration_ms: u64,
    pub correction_duration_ms: u64,
    pub total_duration_ms: u64,
}
