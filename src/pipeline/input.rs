//! Source validation: make sure the input is a readable PDF before any
//! scratch space is allocated or external tooling is launched.
//!
//! pdfium reports a missing or truncated file as a generic load failure;
//! checking existence, permissions and the `%PDF` magic bytes up front gives
//! the job owner a precise reason instead.

use crate::error::ConvertError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_source(path: &Path) -> Result<(), ConvertError> {
    if !path.is_file() {
        return Err(ConvertError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(ConvertError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(_) => {
            return Err(ConvertError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated source PDF: {}", path.display());
    Ok(())
}
