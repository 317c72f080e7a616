//! The top-level orchestrator: one PDF byte stream in, Markdown out.
//!
//! ## Why strictly sequential?
//!
//! The run is thin glue over subprocess invocations and a remote API; every
//! step is awaited to completion before the next begins, and pages are
//! transcribed one at a time in page order. The only mutable state is the
//! accumulating Markdown buffer owned by the loop. Failure at any
//! external-tool step aborts the run; a failed page only degrades (see
//! [`crate::config::RetryPolicy`]).

use crate::client::{CompletionProvider, GeminiClient};
use crate::config::ConversionConfig;
use crate::error::PdfScribeError;
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::{input, tools, transcribe, workdir::WorkDir};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Separator appended after every page fragment, failed pages included.
const PAGE_SEPARATOR: &str = "\n\n";

/// Convert a PDF, given as an in-memory byte blob, to Markdown.
///
/// This is the primary entry point for the library; the binary feeds it
/// stdin, tests feed it fixture bytes.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages degraded to empty
/// fragments (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(PdfScribeError)` for fatal errors only: empty or non-PDF
/// input, no API key, a failed external tool, or — under
/// [`crate::config::ExhaustionPolicy::Propagate`] — an exhausted page.
pub async fn convert_bytes(
    pdf: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfScribeError> {
    let total_start = Instant::now();

    // Fail before any filesystem artifact exists.
    input::validate_pdf_bytes(pdf)?;
    let provider = resolve_provider(config)?;

    let workdir = WorkDir::create(&config.output_root)?;
    let result = run_pipeline(pdf, &provider, &workdir, config, total_start).await;
    // The working directory goes away whatever happened above.
    workdir.cleanup();
    result
}

/// The body of the run, separated so cleanup wraps every exit path.
async fn run_pipeline(
    pdf: &[u8],
    provider: &Arc<dyn CompletionProvider>,
    workdir: &WorkDir,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, PdfScribeError> {
    // ── Persist input ────────────────────────────────────────────────────
    let input_pdf = workdir.input_pdf();
    input::persist(pdf, &input_pdf).await?;

    // ── Resolve page range ───────────────────────────────────────────────
    let total_pages = tools::page_count(&input_pdf).await?;
    let range = config.pages.resolve(total_pages);
    info!("Processing pages {} of {}", range, total_pages);

    // ── Extract sub-range if needed ──────────────────────────────────────
    let raster_input = if range.is_full(total_pages) {
        input_pdf
    } else {
        let extracted = workdir.extracted_pdf();
        tools::extract_range(&input_pdf, &extracted, range).await?;
        extracted
    };

    // ── Rasterise ────────────────────────────────────────────────────────
    let raster_start = Instant::now();
    let mut images = tools::rasterize(&raster_input, &workdir.images_dir(), config.dpi).await?;
    let raster_duration_ms = raster_start.elapsed().as_millis() as u64;
    sort_pages(&mut images);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(images.len());
    }

    // ── Transcribe sequentially ──────────────────────────────────────────
    let transcribe_start = Instant::now();
    let mut pages: Vec<PageResult> = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        // Document page number, not position: a 2-3 range yields pages 2, 3.
        let page_num = range.start as usize + i;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, images.len());
        }
        let result = transcribe::transcribe_page(provider, page_num, image, config).await?;
        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_page_complete(page_num, images.len(), result.markdown.len()),
                Some(e) => cb.on_page_error(page_num, images.len(), &e.to_string()),
            }
        }
        debug!(
            "Page {}: {} chars in {}ms",
            page_num,
            result.markdown.len(),
            result.duration_ms
        );
        pages.push(result);
    }
    let transcribe_duration_ms = transcribe_start.elapsed().as_millis() as u64;

    // ── Assemble ─────────────────────────────────────────────────────────
    let markdown = assemble_document(&pages);

    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    let failed = pages.len() - processed;
    let stats = ConversionStats {
        total_pages: total_pages as usize,
        processed_pages: processed,
        failed_pages: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        raster_duration_ms,
        transcribe_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        processed,
        pages.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(pages.len(), processed);
    }

    Ok(ConversionOutput {
        markdown,
        pages,
        stats,
    })
}

/// Sort image paths lexicographically.
///
/// pdftoppm zero-pads its page numbers to a fixed width, so this order is
/// ascending page order even across the 9→10 digit boundary.
fn sort_pages(images: &mut [PathBuf]) {
    images.sort_unstable();
}

/// Join page fragments, each followed by the blank-line separator.
///
/// Failed pages contribute their (empty) fragment plus the separator, so a
/// degraded page never shifts the separator structure of the document.
fn assemble_document(pages: &[PageResult]) -> String {
    let mut buf = String::new();
    for page in pages {
        buf.push_str(&page.markdown);
        buf.push_str(PAGE_SEPARATOR);
    }
    buf
}

/// Resolve the completion provider, from most-specific to least-specific:
/// a pre-built provider from the config, an explicit API key from the
/// config, or the `GEMINI_API_KEY` environment variable.
fn resolve_provider(
    config: &ConversionConfig,
) -> Result<Arc<dyn CompletionProvider>, PdfScribeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let key = match config.api_key {
        Some(ref key) => key.clone(),
        None => match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => return Err(PdfScribeError::MissingApiKey),
        },
    };

    let mut client = GeminiClient::new(config.base_url.clone(), key);
    if let Some(ref model) = config.model {
        client = client.with_default_model(model.clone());
    }
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_num: usize, markdown: &str) -> PageResult {
        PageResult {
            page_num,
            markdown: markdown.into(),
            duration_ms: 0,
            retries: 0,
            error: None,
        }
    }

    #[test]
    fn fragments_are_each_followed_by_a_blank_line() {
        let pages = vec![page(2, "# Page 2\n"), page(3, "# Page 3\n")];
        assert_eq!(assemble_document(&pages), "# Page 2\n\n\n# Page 3\n\n\n");
    }

    #[test]
    fn failed_page_contributes_empty_fragment_plus_separator() {
        let mut failed = page(2, "");
        failed.error = Some(crate::error::PageError::TranscriptionFailed {
            page: 2,
            attempts: 3,
            detail: "HTTP 503".into(),
        });
        let pages = vec![page(1, "# Page 1\n"), failed, page(3, "# Page 3\n")];
        assert_eq!(
            assemble_document(&pages),
            "# Page 1\n\n\n\n\n# Page 3\n\n\n"
        );
    }

    #[test]
    fn no_pages_yields_empty_document() {
        assert_eq!(assemble_document(&[]), "");
    }

    #[test]
    fn sort_pages_handles_the_digit_length_boundary() {
        // pdftoppm pads page numbers to the width of the page count, so a
        // 12-page document produces page-01 … page-12.
        let mut images: Vec<PathBuf> = [12, 3, 10, 1, 9, 2, 11, 4, 8, 5, 7, 6]
            .iter()
            .map(|n| PathBuf::from(format!("images/page-{n:02}.jpg")))
            .collect();
        sort_pages(&mut images);
        let order: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (1..=12).map(|n| format!("page-{n:02}.jpg")).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn prebuilt_provider_wins_over_keys() {
        use crate::client::{CompletionProvider, CompletionRequest};
        use async_trait::async_trait;

        struct Stub;
        #[async_trait]
        impl CompletionProvider for Stub {
            async fn complete(&self, _r: &CompletionRequest) -> Result<String, PdfScribeError> {
                Ok(String::new())
            }
        }

        let config = ConversionConfig::builder()
            .provider(Arc::new(Stub))
            .api_key("unused")
            .build()
            .unwrap();
        assert!(resolve_provider(&config).is_ok());
    }

    #[test]
    fn explicit_api_key_builds_a_client() {
        let config = ConversionConfig::builder().api_key("k").build().unwrap();
        assert!(resolve_provider(&config).is_ok());
    }

    #[tokio::test]
    async fn empty_input_fails_before_any_artifact() {
        let root = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .api_key("k")
            .output_root(root.path())
            .build()
            .unwrap();
        let err = convert_bytes(b"", &config).await.unwrap_err();
        assert!(matches!(err, PdfScribeError::EmptyInput));
        assert_eq!(
            std::fs::read_dir(root.path()).unwrap().count(),
            0,
            "no working directory may be created for empty input"
        );
    }

    #[tokio::test]
    async fn non_pdf_input_fails_before_any_artifact() {
        let root = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .api_key("k")
            .output_root(root.path())
            .build()
            .unwrap();
        let err = convert_bytes(b"not a pdf at all", &config).await.unwrap_err();
        assert!(matches!(err, PdfScribeError::NotAPdf { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
