//! Input acquisition: buffer the PDF byte stream and persist it.
//!
//! The pipeline reads the whole document from standard input before doing
//! anything else — the external tools all want a file path, and buffering
//! first lets us reject empty or non-PDF input before a working directory
//! or subprocess ever exists.

use crate::error::PdfScribeError;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read standard input to EOF.
pub async fn read_stdin() -> Result<Vec<u8>, PdfScribeError> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .map_err(|e| PdfScribeError::io("reading standard input", e))?;
    debug!("Read {} bytes from stdin", buf.len());
    Ok(buf)
}

/// Reject empty input and byte streams that are clearly not a PDF.
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<(), PdfScribeError> {
    if bytes.is_empty() {
        return Err(PdfScribeError::EmptyInput);
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if &magic != b"%PDF" {
        return Err(PdfScribeError::NotAPdf { magic });
    }
    Ok(())
}

/// Write the buffered input into the working directory.
pub async fn persist(bytes: &[u8], dest: &Path) -> Result<(), PdfScribeError> {
    tokio::fs::write(dest, bytes)
        .await
        .map_err(|e| PdfScribeError::io(format!("writing {}", dest.display()), e))
}
