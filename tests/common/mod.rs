//! In-process fakes for the four conversion capabilities.
//!
//! A "PDF" here is `%PDF\n` followed by page texts separated by form feeds.
//! [`FakeRasterizer`] writes each page's text into `page-NNNN.png` inside the
//! scratch directory it is given, and [`FileRecognizer`] reads it back, so a
//! conversion that picked up another conversion's scratch files would produce
//! the wrong text.

#![allow(dead_code)]

use async_trait::async_trait;
use scan2docx::pipeline::rasterize::page_file_name;
use scan2docx::{ConvertError, Corrector, Edit, PageSelection, Rasterizer, Recognizer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Write a fake scanned PDF whose pages carry `pages` as text.
pub fn write_fake_pdf(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, format!("%PDF\n{}", pages.join("\u{c}"))).unwrap();
    path
}

#[derive(Default)]
pub struct FakeRasterizer {
    pub calls: AtomicUsize,
    pub output_dirs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        source: &Path,
        output_dir: &Path,
        _pages: &PageSelection,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output_dirs.lock().unwrap().push(output_dir.to_path_buf());

        let raw = std::fs::read_to_string(source).map_err(|e| {
            ConvertError::RasterizationFailed {
                path: source.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        let body = raw.strip_prefix("%PDF\n").unwrap_or("");

        let mut images = Vec::new();
        for (idx, page) in body.split('\u{c}').enumerate() {
            let image = output_dir.join(page_file_name(idx));
            assert!(!image.exists(), "scratch collision at {}", image.display());
            std::fs::write(&image, page).unwrap();
            images.push(image);
        }
        // Let concurrent conversions interleave.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(images)
    }
}

/// Rasteriser that always fails.
pub struct BrokenRasterizer;

#[async_trait]
impl Rasterizer for BrokenRasterizer {
    async fn rasterize(
        &self,
        source: &Path,
        _output_dir: &Path,
        _pages: &PageSelection,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        Err(ConvertError::RasterizationFailed {
            path: source.to_path_buf(),
            detail: "corrupt xref table".into(),
        })
    }
}

/// Reads the page text back out of the fake image.
///
/// Pages whose text is `FAIL` error out; pages whose text is `SLOW` hang
/// for a minute.
#[derive(Default)]
pub struct FileRecognizer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Recognizer for FileRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = tokio::fs::read_to_string(image)
            .await
            .map_err(|e| e.to_string())?;
        match text.trim() {
            "FAIL" => Err("tesseract exited with status 1".into()),
            "SLOW" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(text)
            }
            _ => Ok(text),
        }
    }
}

/// What the fake corrector does with its one request.
#[derive(Clone)]
pub enum CorrectorMode {
    Edits(Vec<Edit>),
    Unavailable,
    Hang,
}

pub struct FakeCorrector {
    pub mode: CorrectorMode,
    pub calls: AtomicUsize,
    pub received: Mutex<Vec<String>>,
}

impl FakeCorrector {
    pub fn new(mode: CorrectorMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn no_edits() -> Arc<Self> {
        Self::new(CorrectorMode::Edits(Vec::new()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Corrector for FakeCorrector {
    async fn check(&self, text: &str, _language: &str) -> Result<Vec<Edit>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(text.to_string());
        match &self.mode {
            CorrectorMode::Edits(edits) => Ok(edits.clone()),
            CorrectorMode::Unavailable => Err("HTTP 503 Service Unavailable".into()),
            CorrectorMode::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }
}
