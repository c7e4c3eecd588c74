//! Text recognition: turn one page image into raw text.
//!
//! The [`Recognizer`] trait is the seam between the orchestrator and the OCR
//! engine. The default [`TesseractRecognizer`] shells out to the `tesseract`
//! CLI; [`crate::pipeline::vision::VisionRecognizer`] sends the page to a
//! vision LLM instead. Swapping one for the other never changes the
//! orchestration logic.
//!
//! Timeouts are enforced by the orchestrator around every call, so
//! implementations need not bound their own runtime.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Turns one page image into raw recognised text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise the text on `image`.
    ///
    /// The error string is wrapped by the orchestrator into
    /// [`crate::error::ConvertError::RecognitionFailed`] with the page number.
    async fn recognize(&self, image: &Path) -> Result<String, String>;
}

/// Recogniser backed by the `tesseract` command-line engine.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }

    /// Use a tesseract binary other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, String> {
        let output = self
            .command(image)
            .output()
            .await
            .map_err(|e| format!("failed to run '{}': {}", self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "'{}' exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract recognised {} bytes from {}",
            text.len(),
            image.display()
        );
        Ok(text)
    }
}
