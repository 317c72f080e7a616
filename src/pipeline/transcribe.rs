//! Per-page transcription: one completion call with bounded retry.
//!
//! This stage is intentionally thin — the prompt lives in
//! [`crate::prompts`], the transport in [`crate::client`], and the retry
//! knobs in [`crate::config::RetryPolicy`]. What remains here is the loop:
//! call, wait a fixed delay on failure, try again, and on exhaustion either
//! degrade the page to an empty fragment or abort the run, depending on the
//! configured [`ExhaustionPolicy`].
//!
//! The backoff is a flat 500 ms by default, not exponential: the pipeline is
//! strictly sequential, so there is no herd of concurrent workers to spread
//! out, and a transient API hiccup usually clears within a beat.

use crate::client::{CompletionProvider, CompletionRequest};
use crate::config::{ConversionConfig, ExhaustionPolicy};
use crate::error::{PageError, PdfScribeError};
use crate::output::PageResult;
use crate::prompts::PAGE_TRANSCRIPTION_PROMPT;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::warn;

/// Model used for every page-image transcription call, independent of any
/// configured default completion model.
pub const VISION_MODEL: &str = "gemini-1.5-pro";

/// Transcribe one page image to Markdown.
///
/// Returns `Ok` with a populated [`PageResult`] on success, `Ok` with an
/// empty-markdown result under [`ExhaustionPolicy::DegradeToEmpty`], and
/// `Err` only under [`ExhaustionPolicy::Propagate`].
pub async fn transcribe_page(
    provider: &Arc<dyn CompletionProvider>,
    page_num: usize,
    image: &Path,
    config: &ConversionConfig,
) -> Result<PageResult, PdfScribeError> {
    let start = Instant::now();
    let request = CompletionRequest {
        model: Some(VISION_MODEL.to_string()),
        message: PAGE_TRANSCRIPTION_PROMPT.to_string(),
        system: config.system_prompt.clone(),
        images: vec![image.to_path_buf()],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut last_err = String::new();
    for attempt in 1..=config.retry.max_attempts {
        if attempt > 1 {
            sleep(config.retry.backoff).await;
        }

        match provider.complete(&request).await {
            Ok(markdown) => {
                return Ok(PageResult {
                    page_num,
                    markdown,
                    duration_ms: start.elapsed().as_millis() as u64,
                    retries: attempt - 1,
                    error: None,
                })
            }
            Err(e) => {
                warn!(
                    "Page {}: attempt {}/{} failed — {}",
                    page_num, attempt, config.retry.max_attempts, e
                );
                last_err = e.to_string();
            }
        }
    }

    let error = PageError::TranscriptionFailed {
        page: page_num,
        attempts: config.retry.max_attempts,
        detail: last_err,
    };

    match config.retry.on_exhaustion {
        ExhaustionPolicy::DegradeToEmpty => {
            warn!("Page {}: giving up, emitting empty fragment", page_num);
            Ok(PageResult {
                page_num,
                markdown: String::new(),
                duration_ms: start.elapsed().as_millis() as u64,
                retries: config.retry.max_attempts - 1,
                error: Some(error),
            })
        }
        ExhaustionPolicy::Propagate => Err(error.into()),
    }
}
