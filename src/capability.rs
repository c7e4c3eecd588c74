//! Static table of supported (source type, target type) conversions.
//!
//! The orchestrator checks this table before touching the filesystem, so an
//! unsupported pair fails with [`ConvertError::UnsupportedConversion`]
//! without any partial work.

use crate::error::ConvertError;

/// Every supported conversion. Type names are lower-case file extensions.
pub const SUPPORTED_CONVERSIONS: &[(&str, &[&str])] = &[("pdf", &["docx", "txt"])];

/// Output formats a reassembler can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Docx,
    Text,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Text => "txt",
        }
    }
}

/// Whether `from → to` appears in [`SUPPORTED_CONVERSIONS`] (case-insensitive).
pub fn is_supported(from: &str, to: &str) -> bool {
    let from = from.trim().to_ascii_lowercase();
    let to = to.trim().to_ascii_lowercase();
    SUPPORTED_CONVERSIONS
        .iter()
        .any(|(src, targets)| *src == from && targets.contains(&to.as_str()))
}

/// All targets reachable from `from`; empty for unknown sources.
pub fn supported_targets(from: &str) -> &'static [&'static str] {
    let from = from.trim().to_ascii_lowercase();
    SUPPORTED_CONVERSIONS
        .iter()
        .find(|(src, _)| *src == from)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// Validate the pair and resolve the output format.
pub fn check(from: &str, to: &str) -> Result<TargetFormat, ConvertError> {
    if !is_supported(from, to) {
        return Err(ConvertError::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    match to.trim().to_ascii_lowercase().as_str() {
        "docx" => Ok(TargetFormat::Docx),
        "txt" => Ok(TargetFormat::Text),
        other => Err(ConvertError::Internal(format!(
            "capability table lists '{other}' without a reassembler"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_to_docx_supported() {
        assert!(is_supported("pdf", "docx"));
        assert!(is_supported("PDF", "DocX"));
        assert_eq!(check("pdf", "docx").unwrap(), TargetFormat::Docx);
        assert_eq!(check("pdf", "txt").unwrap(), TargetFormat::Text);
    }

    #[test]
    fn everything_else_rejected() {
        for (from, to) in [("png", "docx"), ("pdf", "pdf"), ("docx", "pdf"), ("", "")] {
            assert!(!is_supported(from, to), "{from}->{to}");
            assert!(matches!(
                check(from, to),
                Err(ConvertError::UnsupportedConversion { .. })
            ));
        }
    }

    #[test]
    fn targets_for_unknown_source_empty() {
        assert_eq!(supported_targets("pdf"), &["docx", "txt"]);
        assert!(supported_targets("tiff").is_empty());
    }

    #[test]
    fn every_listed_target_has_a_format() {
        for (from, targets) in SUPPORTED_CONVERSIONS {
            for to in *targets {
                let format = check(from, to).unwrap();
                assert_eq!(format.extension(), *to);
            }
        }
    }
}
