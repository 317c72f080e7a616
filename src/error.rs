//! Error types for the pdfscribe library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfScribeError`] — **Fatal**: the conversion cannot proceed at all
//!   (empty input, missing API key, an external tool failed). Returned as
//!   `Err(PdfScribeError)` from [`crate::convert::convert_bytes`].
//!
//! * [`PageError`] — **Non-fatal**: a single page's transcription failed
//!   after all retry attempts but the run continues. Stored inside
//!   [`crate::output::PageResult`] so callers can see which pages degraded
//!   to an empty fragment instead of losing the whole document.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! page failure (via [`crate::config::ExhaustionPolicy::Propagate`]), or
//! accept silent gaps and inspect `PageResult::error` afterwards.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfscribe library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PdfScribeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Standard input was empty — there is nothing to convert.
    #[error("No PDF data on standard input.\nUsage: pdfscribe [START_PAGE] END_PAGE < document.pdf")]
    EmptyInput,

    /// The input stream does not start with the PDF magic bytes.
    #[error("Input is not a PDF (expected it to start with %PDF, got {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// No API key was configured and the environment provides none.
    #[error("No API key configured.\nSet GEMINI_API_KEY or pass one via ConversionConfig::builder().api_key(...).")]
    MissingApiKey,

    // ── External-tool errors ──────────────────────────────────────────────
    /// An external tool could not be started at all.
    #[error("Failed to spawn '{tool}': {source}\nCheck that {tool} is installed and on PATH.")]
    ToolSpawnFailed {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran but exited with a non-zero status.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    /// pdfinfo ran successfully but its output had no parsable page count.
    #[error("Could not find a 'Pages: <N>' line in pdfinfo output:\n{output}")]
    PageCountUnparsable { output: String },

    // ── API errors ────────────────────────────────────────────────────────
    /// The completion request failed at the transport level.
    #[error("Completion request failed: {0}")]
    ApiTransport(#[from] reqwest::Error),

    /// The completion endpoint answered with a non-success HTTP status.
    #[error("Completion API returned HTTP {status}: {body}")]
    ApiStatus { status: u16, body: String },

    /// A page image could not be read for embedding in the request.
    #[error("Failed to read page image '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Working-directory or intermediate-file I/O failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A page failed and the configured policy is to abort the run.
    #[error(transparent)]
    PageFailed(#[from] PageError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PdfScribeError {
    /// Wrap an I/O error with a short description of what was being done.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored inside [`crate::output::PageResult`] when a page's transcription
/// fails after every retry attempt. The overall conversion continues and the
/// page contributes an empty fragment.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The completion call failed on every attempt.
    #[error("Page {page}: transcription failed after {attempts} attempts: {detail}")]
    TranscriptionFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failed_display_names_tool_and_status() {
        let e = PdfScribeError::ToolFailed {
            tool: "pdfinfo",
            status: "exit status: 99".into(),
            stderr: "I/O Error".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdfinfo"), "got: {msg}");
        assert!(msg.contains("99"), "got: {msg}");
    }

    #[test]
    fn page_count_unparsable_includes_output() {
        let e = PdfScribeError::PageCountUnparsable {
            output: "Producer: GPL Ghostscript".into(),
        };
        assert!(e.to_string().contains("Ghostscript"));
    }

    #[test]
    fn transcription_failed_display() {
        let e = PageError::TranscriptionFailed {
            page: 4,
            attempts: 3,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 4"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn empty_input_mentions_usage() {
        assert!(PdfScribeError::EmptyInput.to_string().contains("Usage"));
    }
}
