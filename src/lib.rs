//! # pdfscribe
//!
//! Transcribe PDF documents to Markdown using a vision language model.
//!
//! ## Why this crate?
//!
//! Traditional PDF-to-text tools (pdftotext, pdf-extract) fail on complex
//! layouts — multi-column text, mathematical symbols, and tables come out
//! garbled or out of reading order. Instead this crate rasterises each page
//! into a JPEG and lets a vision model read it as a human would, producing
//! Markdown that preserves headings, formulas, and table structure.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (stdin)
//!  │
//!  ├─ 1. Input       buffer and validate the byte stream
//!  ├─ 2. Workdir     fresh output/<timestamp>/ scope for intermediates
//!  ├─ 3. Range       pdfinfo page count → clamp requested [start, end]
//!  ├─ 4. Extract     qpdf sub-range extraction (skipped for full range)
//!  ├─ 5. Rasterise   pdftoppm → one JPEG per page at 300 DPI
//!  ├─ 6. Transcribe  one completion call per page, bounded retry
//!  └─ 7. Output      fragments + blank-line separators, in page order
//! ```
//!
//! Everything runs strictly in sequence; there is no concurrent fan-out
//! across pages. `pdfinfo`, `qpdf`, and `pdftoppm` must be on `PATH`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscribe::{convert_bytes, ConversionConfig, PageRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pdf = std::fs::read("document.pdf")?;
//!     // API key from GEMINI_API_KEY unless set explicitly.
//!     let config = ConversionConfig::builder()
//!         .pages(PageRequest { start: Some(2), end: Some(3) })
//!         .build()?;
//!     let output = convert_bytes(&pdf, &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} pages failed", output.stats.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfscribe` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfscribe = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{CompletionProvider, CompletionRequest, GeminiClient};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, ExhaustionPolicy, PageRange, PageRequest,
    RetryPolicy, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
pub use convert::convert_bytes;
pub use error::{PageError, PdfScribeError};
pub use output::{ConversionOutput, ConversionStats, PageResult};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
