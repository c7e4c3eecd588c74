//! Reassembly: encode corrected lines into the output document bytes.
//!
//! The orchestrator only sees the [`Reassembler`] trait; the binary format
//! lives entirely in the implementation. Each line becomes one paragraph so
//! the output keeps the scanned page's line structure.

use crate::capability::TargetFormat;
use docx_rs::{Docx, Paragraph, Run};
use std::io::Cursor;
use std::sync::Arc;

/// Turns an ordered sequence of lines into a binary document.
pub trait Reassembler: Send + Sync {
    /// Encode `lines` in order. The error string is wrapped by the
    /// orchestrator into `ReassemblyFailed`.
    fn assemble(&self, lines: &[String]) -> Result<Vec<u8>, String>;
}

/// Word (`.docx`) output, one paragraph per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxReassembler;

impl Reassembler for DocxReassembler {
    fn assemble(&self, lines: &[String]) -> Result<Vec<u8>, String> {
        let docx = lines.iter().fold(Docx::new(), |doc, line| {
            doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)))
        });

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| format!("packing docx: {e}"))?;
        Ok(buf.into_inner())
    }
}

/// UTF-8 plain-text output with a trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextReassembler;

impl Reassembler for PlainTextReassembler {
    fn assemble(&self, lines: &[String]) -> Result<Vec<u8>, String> {
        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out.into_bytes())
    }
}

/// Built-in reassembler for a target format.
pub fn for_target(format: TargetFormat) -> Arc<dyn Reassembler> {
    match format {
        TargetFormat::Docx => Arc::new(DocxReassembler),
        TargetFormat::Text => Arc::new(PlainTextReassembler),
    }
}
