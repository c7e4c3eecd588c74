//! Grammar correction: submit the recognised text once, apply returned edits.
//!
//! The correction service answers with offset-indexed replacement
//! suggestions rather than corrected text. Edits are applied in descending
//! offset order so that applying one never shifts the position of an edit
//! still waiting to be applied.
//!
//! This is the only stage with a remote dependency. Failures surface as
//! [`crate::error::ConvertError::CorrectionServiceUnavailable`] so callers
//! can retry them, unlike local tooling failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One suggested replacement. Offsets and lengths count Unicode scalar
/// values (Rust `char`s) in the submitted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub offset: usize,
    pub length: usize,
    pub replacement: String,
}

impl Edit {
    pub fn new(offset: usize, length: usize, replacement: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            replacement: replacement.into(),
        }
    }

    /// One past the last replaced char; `None` when the sum overflows.
    fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }
}

/// Turns raw text into a list of suggested edits.
#[async_trait]
pub trait Corrector: Send + Sync {
    /// Check `text` and return suggested edits in any order.
    ///
    /// The error string is wrapped by the orchestrator into
    /// `CorrectionServiceUnavailable`.
    async fn check(&self, text: &str, language: &str) -> Result<Vec<Edit>, String>;
}

/// Result of [`apply_edits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corrected {
    pub text: String,
    pub applied: usize,
    /// Edits out of range or overlapping an already-applied edit.
    pub skipped: usize,
}

/// Apply `edits` to `text` in descending offset order.
///
/// An edit is skipped when it reaches past the end of the text or overlaps
/// an edit already applied (i.e. one with a higher offset).
pub fn apply_edits(text: &str, edits: &[Edit]) -> Corrected {
    // Byte position of every char boundary, including the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.offset.cmp(&a.offset).then(b.length.cmp(&a.length)));

    let mut out = text.to_string();
    let mut floor = char_len;
    let mut applied = 0;
    let mut skipped = 0;

    for edit in ordered {
        let Some(end) = edit.end().filter(|&end| end <= floor) else {
            debug!(
                "Skipping edit at {}+{} (limit {})",
                edit.offset, edit.length, floor
            );
            skipped += 1;
            continue;
        };
        let start = boundaries[edit.offset];
        let end = boundaries[end];
        out.replace_range(start..end, &edit.replacement);
        floor = edit.offset;
        applied += 1;
    }

    Corrected {
        text: out,
        applied,
        skipped,
    }
}

// ── LanguageTool ─────────────────────────────────────────────────────────

/// Corrector backed by a LanguageTool `/v2/check` endpoint.
#[derive(Debug, Clone)]
pub struct LanguageToolCorrector {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    matches: Vec<CheckMatch>,
}

#[derive(Debug, Deserialize)]
struct CheckMatch {
    offset: usize,
    length: usize,
    #[serde(default)]
    replacements: Vec<Replacement>,
}

#[derive(Debug, Deserialize)]
struct Replacement {
    value: String,
}

impl LanguageToolCorrector {
    /// `timeout` bounds the whole request including the response body.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("building HTTP client: {e}"))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Corrector for LanguageToolCorrector {
    async fn check(&self, text: &str, language: &str) -> Result<Vec<Edit>, String> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("text", text), ("language", language)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("request to {} timed out", self.url)
                } else {
                    format!("request to {} failed: {}", self.url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} answered HTTP {}", self.url, status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("reading response from {}: {}", self.url, e))?;

        let edits = parse_check_response(text, &body)?;
        debug!("Correction service suggested {} edits", edits.len());
        Ok(edits)
    }
}

/// Parse a `/v2/check` body into edits with char offsets.
///
/// LanguageTool counts offsets in UTF-16 code units; they are converted
/// against the submitted text. Matches without replacements are dropped and
/// the first replacement wins.
fn parse_check_response(text: &str, body: &[u8]) -> Result<Vec<Edit>, String> {
    let parsed: CheckResponse =
        serde_json::from_slice(body).map_err(|e| format!("malformed response: {e}"))?;

    let mut edits = Vec::with_capacity(parsed.matches.len());
    for m in parsed.matches {
        let Some(first) = m.replacements.into_iter().next() else {
            continue;
        };
        let start = utf16_to_char_offset(text, m.offset);
        let end = m
            .offset
            .checked_add(m.length)
            .and_then(|end| utf16_to_char_offset(text, end));
        match (start, end) {
            (Some(start), Some(end)) => edits.push(Edit::new(start, end - start, first.value)),
            _ => warn!(
                "Ignoring match at UTF-16 offset {}+{} outside the text",
                m.offset, m.length
            ),
        }
    }
    Ok(edits)
}

/// Convert a UTF-16 code-unit offset into a char offset. `None` when the
/// offset is past the end or splits a surrogate pair.
fn utf16_to_char_offset(text: &str, utf16_offset: usize) -> Option<usize> {
    let mut units = 0;
    for (chars, c) in text.chars().enumerate() {
        if units == utf16_offset {
            return Some(chars);
        }
        if units > utf16_offset {
            return None;
        }
        units += c.len_utf16();
    }
    (units == utf16_offset).then(|| text.chars().count())
}
