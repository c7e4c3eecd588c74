//! Configuration types for scanned-PDF conversion and the job store.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be cloned into concurrently running conversions and logged as a
//! whole.
//!
//! Capability overrides (`rasterizer`, `recognizer_override`, `corrector`,
//! `reassembler`) take precedence over the named defaults, which is how tests
//! and embedders substitute fakes without touching the orchestration logic.

use crate::error::ConvertError;
use crate::pipeline::assemble::Reassembler;
use crate::pipeline::correct::Corrector;
use crate::pipeline::rasterize::Rasterizer;
use crate::pipeline::recognize::Recognizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Public LanguageTool endpoint used when no corrector URL is configured.
pub const DEFAULT_CORRECTOR_URL: &str = "https://api.languagetool.org/v2/check";

/// Configuration for a scanned-PDF conversion.
///
/// # Example
/// ```rust
/// use scan2docx::{ConversionConfig, PageFailurePolicy};
///
/// let config = ConversionConfig::builder()
///     .language("en-GB")
///     .page_failure_policy(PageFailurePolicy::Skip)
///     .correction_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// OCR accuracy plateaus around 300 DPI for body text; capping the long
    /// edge keeps memory bounded on oversized scans.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection handed to the rasteriser. Default: all pages.
    pub pages: PageSelection,

    /// Language code sent to the correction service. Default: `en-US`.
    pub language: String,

    /// Correction service endpoint. Default: [`DEFAULT_CORRECTOR_URL`].
    pub corrector_url: String,

    /// Upper bound on the single correction call, in seconds. Default: 30.
    ///
    /// Distinct from the recognition timeout: this guards a remote service.
    pub correction_timeout_secs: u64,

    /// Upper bound on each page's recognition, in seconds. Default: 120.
    pub recognition_timeout_secs: u64,

    /// Which built-in recogniser to use. Default: [`RecognizerKind::Tesseract`].
    pub recognizer: RecognizerKind,

    /// Tesseract language pack(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub tesseract_language: String,

    /// Vision model id for [`RecognizerKind::Vision`].
    pub model: Option<String>,

    /// Vision provider name for [`RecognizerKind::Vision`].
    pub provider_name: Option<String>,

    /// Retries per page for the vision recogniser. Default: 2.
    pub max_retries: u32,

    /// Initial vision retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// What to do when one page fails recognition. Default: abort the file.
    pub page_failure_policy: PageFailurePolicy,

    /// What to do when correction fails. Default: fail the file.
    pub correction_policy: CorrectionPolicy,

    /// Directory under which per-conversion scratch directories are made.
    /// Default: the system temp directory.
    pub scratch_root: Option<PathBuf>,

    /// Files converted in parallel by the job runner. Default: 4.
    pub concurrency: usize,

    /// Optional progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-built rasteriser. Takes precedence over the pdfium default.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Pre-built recogniser. Takes precedence over `recognizer`.
    pub recognizer_override: Option<Arc<dyn Recognizer>>,

    /// Pre-built corrector. Takes precedence over `corrector_url`.
    pub corrector: Option<Arc<dyn Corrector>>,

    /// Pre-built reassembler. Takes precedence over the per-target default.
    pub reassembler: Option<Arc<dyn Reassembler>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            password: None,
            pages: PageSelection::default(),
            language: "en-US".to_string(),
            corrector_url: DEFAULT_CORRECTOR_URL.to_string(),
            correction_timeout_secs: 30,
            recognition_timeout_secs: 120,
            recognizer: RecognizerKind::default(),
            tesseract_language: "eng".to_string(),
            model: None,
            provider_name: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            page_failure_policy: PageFailurePolicy::default(),
            correction_policy: CorrectionPolicy::default(),
            scratch_root: None,
            concurrency: 4,
            progress_callback: None,
            rasterizer: None,
            recognizer_override: None,
            corrector: None,
            reassembler: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("language", &self.language)
            .field("corrector_url", &self.corrector_url)
            .field("correction_timeout_secs", &self.correction_timeout_secs)
            .field("recognition_timeout_secs", &self.recognition_timeout_secs)
            .field("recognizer", &self.recognizer)
            .field("tesseract_language", &self.tesseract_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("page_failure_policy", &self.page_failure_policy)
            .field("correction_policy", &self.correction_policy)
            .field("scratch_root", &self.scratch_root)
            .field("concurrency", &self.concurrency)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field(
                "recognizer_override",
                &self.recognizer_override.as_ref().map(|_| "<dyn Recognizer>"),
            )
            .field("corrector", &self.corrector.as_ref().map(|_| "<dyn Corrector>"))
            .field("reassembler", &self.reassembler.as_ref().map(|_| "<dyn Reassembler>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn correction_timeout(&self) -> Duration {
        Duration::from_secs(self.correction_timeout_secs)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.recognition_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn corrector_url(mut self, url: impl Into<String>) -> Self {
        self.config.corrector_url = url.into();
        self
    }

    pub fn correction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.correction_timeout_secs = secs;
        self
    }

    pub fn recognition_timeout_secs(mut self, secs: u64) -> Self {
        self.config.recognition_timeout_secs = secs;
        self
    }

    pub fn recognizer(mut self, kind: RecognizerKind) -> Self {
        self.config.recognizer = kind;
        self
    }

    pub fn tesseract_language(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.config.page_failure_policy = policy;
        self
    }

    pub fn correction_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.config.correction_policy = policy;
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn rasterizer(mut self, r: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(r);
        self
    }

    pub fn recognizer_override(mut self, r: Arc<dyn Recognizer>) -> Self {
        self.config.recognizer_override = Some(r);
        self
    }

    pub fn corrector(mut self, c: Arc<dyn Corrector>) -> Self {
        self.config.corrector = Some(c);
        self
    }

    pub fn reassembler(mut self, r: Arc<dyn Reassembler>) -> Self {
        self.config.reassembler = Some(r);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.correction_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Correction timeout must be ≥ 1s".into(),
            ));
        }
        if c.recognition_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Recognition timeout must be ≥ 1s".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Correction language must not be empty".into(),
            ));
        }
        if c.corrector.is_none()
            && !(c.corrector_url.starts_with("http://") || c.corrector_url.starts_with("https://"))
        {
            return Err(ConvertError::InvalidConfig(format!(
                "Corrector URL must be http(s), got '{}'",
                c.corrector_url
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Built-in recognisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecognizerKind {
    /// The `tesseract` command-line engine. (default)
    #[default]
    Tesseract,
    /// A vision LLM transcribing each page image.
    Vision,
}

/// Policy for a page whose recognition fails.
///
/// `Abort` matches the reference behaviour: a missing page is worse than a
/// failed job, so the whole file fails with the recogniser's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Fail the whole file on the first page error. (default)
    #[default]
    Abort,
    /// Record a [`crate::error::PageError`] and continue with the next page.
    Skip,
}

/// Policy for a failed correction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrectionPolicy {
    /// Fail the file with `CorrectionServiceUnavailable`. (default)
    #[default]
    Required,
    /// Log the failure and reassemble the uncorrected text.
    BestEffort,
}

/// Specifies which pages of the PDF to rasterise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Where the job store lives and how it is pooled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Default: `./data/mydb.sqlite`.
    pub path: PathBuf,
    /// Pool size. Default: 4.
    pub max_connections: u32,
    /// How long a writer waits on a locked database, in seconds. Default: 5.
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/mydb.sqlite"),
            max_connections: 4,
            busy_timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}
