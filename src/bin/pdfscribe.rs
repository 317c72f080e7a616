//! CLI binary for pdfscribe.
//!
//! A thin shim over the library crate: maps argv and environment variables
//! to a `ConversionConfig`, reads the PDF from standard input, and writes
//! the assembled Markdown to standard output.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfscribe::pipeline::input;
use pdfscribe::{
    convert_bytes, ConversionConfig, ConversionProgressCallback, ExhaustionPolicy, PageRequest,
    ProgressCallback, RetryPolicy, DEFAULT_BASE_URL,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a single bar on stderr plus one log line per
/// page. Pages arrive strictly in order, so a lone slot for the per-page
/// start time is enough.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Bar length is set dynamically by `on_conversion_start`, once the
    /// page images exist and the total is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        *self.page_started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages transcribed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed)",
                red("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole document
  pdfscribe 0 < document.pdf > document.md

  # First five pages (single argument = end page, start defaults to 1)
  pdfscribe 5 < document.pdf

  # Pages 2 through 3
  pdfscribe 2 3 < document.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    API key (required)
  GEMINI_BASE_URL   Completion API base URL
  GEMINI_MODEL      Default completion model (the vision transcription
                    call always uses gemini-1.5-pro)

EXTERNAL TOOLS (must be on PATH):
  pdfinfo, qpdf, pdftoppm
"#;

/// Transcribe a PDF from stdin to Markdown on stdout using a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscribe",
    version,
    about = "Transcribe a PDF (stdin) to Markdown (stdout) using a vision LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page selection: `END` (start defaults to 1) or `START END`,
    /// 1-indexed inclusive, clamped to the document. 0 means "last page".
    #[arg(value_name = "PAGE", num_args = 1..=2, required = true)]
    pages: Vec<u32>,

    /// API key for the completion endpoint.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the completion API.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Default completion model id. The per-page vision call is pinned to
    /// gemini-1.5-pro regardless.
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Rasterisation DPI (72–600).
    #[arg(long, env = "PDFSCRIBE_DPI", default_value_t = 300)]
    dpi: u32,

    /// Transcription attempts per page.
    #[arg(long, env = "PDFSCRIBE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Delay between attempts, in milliseconds.
    #[arg(long, env = "PDFSCRIBE_RETRY_DELAY_MS", default_value_t = 500)]
    retry_delay_ms: u64,

    /// Abort the run when a page fails every attempt, instead of emitting
    /// an empty fragment for it.
    #[arg(long, env = "PDFSCRIBE_STRICT")]
    strict: bool,

    /// Parent directory for per-run working directories.
    #[arg(long, env = "PDFSCRIBE_OUTPUT_ROOT", default_value = "output")]
    output_root: PathBuf,

    /// Disable the progress bar.
    #[arg(long, env = "PDFSCRIBE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSCRIBE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    // A usage error must exit 1 before standard input is touched.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli, show_progress).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, show_progress: bool) -> Result<()> {
    // Fail on a missing key before reading a potentially large stdin.
    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .context("GEMINI_API_KEY is not set")?;

    let pdf = input::read_stdin().await?;

    let config = build_config(&cli, api_key, show_progress)?;
    let output = convert_bytes(&pdf, &config).await?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(output.markdown.as_bytes())
        .context("Failed to write to stdout")?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Transcribed {}/{} pages in {}ms",
            output.stats.processed_pages,
            output.stats.processed_pages + output.stats.failed_pages,
            output.stats.total_duration_ms
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, api_key: String, show_progress: bool) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages);

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .api_key(api_key)
        .base_url(cli.base_url.clone())
        .output_root(cli.output_root.clone())
        .retry(RetryPolicy {
            max_attempts: cli.max_attempts,
            backoff: Duration::from_millis(cli.retry_delay_ms),
            on_exhaustion: if cli.strict {
                ExhaustionPolicy::Propagate
            } else {
                ExhaustionPolicy::DegradeToEmpty
            },
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    builder.build().context("Invalid configuration")
}

/// One positional argument is the end page with start = 1; two are
/// start and end. Out-of-range values are clamped later, against the
/// document's actual page count.
fn parse_pages(args: &[u32]) -> PageRequest {
    match args {
        [end] => PageRequest {
            start: Some(1),
            end: Some(*end),
        },
        [start, end] => PageRequest {
            start: Some(*start),
            end: Some(*end),
        },
        // clap's num_args(1..=2) makes anything else unreachable.
        _ => PageRequest::all(),
    }
}
