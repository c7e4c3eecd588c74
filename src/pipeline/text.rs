//! Text normalisation: turn raw recogniser output into clean, ordered lines.
//!
//! Tesseract emits form feeds, CRLF endings and trailing blanks; vision
//! models occasionally wrap the transcription in code fences despite being
//! told not to. These rules are deterministic and pure (`&str → String`), so
//! they can run on any recogniser's output before line collection.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw model output; invisible characters go before trimming so a
//! line consisting only of a zero-width space becomes empty and is dropped.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every normalisation rule to raw recogniser output.
///
/// Rules (applied in order):
/// 1. Strip outer code fences (vision models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF / CR / form feed → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
pub fn normalise(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

/// Normalise `raw` and return its trimmed, non-empty lines in order.
pub fn collect_lines(raw: &str) -> Vec<String> {
    normalise(raw)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join page lines into the single blob submitted for correction.
pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// Split a corrected blob back into lines for reassembly.
///
/// Corrections may introduce or remove line breaks; empty lines produced by
/// a correction are kept so paragraph breaks survive.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:text|plaintext|markdown)?\r?\n(.*)\r?\n```\s*$")
        .expect("static regex")
});

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}
