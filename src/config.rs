//! Configuration types for PDF-to-Markdown transcription.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs, log them, and diff two runs to understand why
//! their outputs differ — and it keeps environment lookups out of the
//! library: the binary reads env vars once and feeds them in here.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::client::CompletionProvider;
use crate::error::PdfScribeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default completion endpoint (Google generative-language API host).
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Default completion model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Configuration for one PDF-to-Markdown run.
///
/// Built via [`ConversionConfig::builder()`] or [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfscribe::{ConversionConfig, PageRequest};
///
/// let config = ConversionConfig::builder()
///     .api_key("sk-test")
///     .pages(PageRequest { start: Some(2), end: Some(3) })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation DPI passed to the rendering tool. Default: 300.
    ///
    /// 300 DPI keeps small fonts, subscripts, and table rules legible to the
    /// vision model. Lower values shrink the request payload at the cost of
    /// transcription accuracy on dense pages.
    pub dpi: u32,

    /// Requested page range, resolved against the document's actual page
    /// count at run time. Default: the whole document.
    pub pages: PageRequest,

    /// Default completion model id.
    ///
    /// The per-page transcription call always uses [`DEFAULT_MODEL`]
    /// regardless of this field; the default exists for callers issuing
    /// their own text-only completions through the same client.
    pub model: Option<String>,

    /// Sampling temperature for the transcription call. Default: 0.3.
    ///
    /// Low temperature keeps the model faithful to what is on the page.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 8192.
    ///
    /// Dense pages (tables, code listings) can run long; setting this too
    /// low silently truncates the Markdown mid-sentence.
    pub max_tokens: u32,

    /// Retry behaviour for per-page transcription calls.
    pub retry: RetryPolicy,

    /// Bearer token for the completion API.
    ///
    /// `None` means "read GEMINI_API_KEY from the environment" — the lookup
    /// happens once, when the provider is resolved, not per call.
    pub api_key: Option<String>,

    /// Base URL of the completion API. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Pre-constructed completion provider. Takes precedence over
    /// `api_key`/`base_url`; the seam used by tests to stub the API.
    pub provider: Option<Arc<dyn CompletionProvider>>,

    /// Custom system prompt sent before the user turn. Default: none.
    pub system_prompt: Option<String>,

    /// Parent directory for per-run working directories. Default: `output`.
    pub output_root: PathBuf,

    /// Optional progress events receiver (used by the CLI progress bar).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            pages: PageRequest::default(),
            model: None,
            temperature: 0.3,
            max_tokens: 8192,
            retry: RetryPolicy::default(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            provider: None,
            system_prompt: None,
            output_root: PathBuf::from("output"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("pages", &self.pages)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn CompletionProvider>"))
            .field("output_root", &self.output_root)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn pages(mut self, pages: PageRequest) -> Self {
        self.config.pages = pages;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PdfScribeError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PdfScribeError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.retry.max_attempts == 0 {
            return Err(PdfScribeError::InvalidConfig(
                "retry.max_attempts must be ≥ 1".into(),
            ));
        }
        if c.base_url.is_empty() {
            return Err(PdfScribeError::InvalidConfig("base_url must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Page ranges ──────────────────────────────────────────────────────────

/// The page range as requested by the caller, before the document's page
/// count is known. `None` fields default during [`PageRequest::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Requested first page, 1-indexed. `None` means page 1.
    pub start: Option<u32>,
    /// Requested last page, 1-indexed inclusive. `None` means the last page.
    pub end: Option<u32>,
}

impl PageRequest {
    /// Request the whole document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Resolve against the document's actual page count.
    ///
    /// An unset or out-of-bounds start becomes 1; an unset, zero, or
    /// out-of-bounds end becomes `total_pages`. An inverted range
    /// (start > end) is preserved as-is and handed to the extraction tool
    /// unchanged.
    pub fn resolve(&self, total_pages: u32) -> PageRange {
        let start = match self.start {
            Some(s) if s >= 1 && s <= total_pages => s,
            _ => 1,
        };
        let end = match self.end {
            Some(e) if e >= 1 && e <= total_pages => e,
            _ => total_pages,
        };
        PageRange { start, end }
    }
}

/// A resolved, 1-indexed, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// True when the range covers the whole document, in which case the
    /// extraction step is skipped and rasterisation reads the original PDF.
    pub fn is_full(&self, total_pages: u32) -> bool {
        self.start == 1 && self.end == total_pages
    }

    /// Number of pages the range selects (0 for an inverted range).
    pub fn len(&self) -> u32 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Retry behaviour for a per-page transcription call.
///
/// Retry-with-silent-degradation is a policy decision, not an accident of
/// control flow, so it lives in a value that tests can swap for
/// [`ExhaustionPolicy::Propagate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first. Default: 3.
    pub max_attempts: u32,
    /// Fixed delay between attempts. Default: 500 ms.
    pub backoff: Duration,
    /// What to do when every attempt has failed.
    pub on_exhaustion: ExhaustionPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            on_exhaustion: ExhaustionPolicy::DegradeToEmpty,
        }
    }
}

/// Behaviour after the last failed attempt for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Record the failure in the page result and contribute an empty
    /// fragment; the run continues. (default)
    #[default]
    DegradeToEmpty,
    /// Abort the whole run with the page's error.
    Propagate,
}
