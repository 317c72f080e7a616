//! External-tool adapters: page count, range extraction, rasterisation.
//!
//! The pipeline never parses PDF binary structure itself — it shells out to
//! the poppler/qpdf utilities expected on `PATH` and judges success purely
//! by exit status. Each wrapper resolves once the subprocess closes and
//! surfaces the tool's name, exit status, and captured stderr on failure.
//! Nothing here retries; a failing tool aborts the run.
//!
//! | operation      | command                                          |
//! |----------------|--------------------------------------------------|
//! | page count     | `pdfinfo <pdf>`                                  |
//! | extract range  | `qpdf <src> --pages . <start>-<end> -- <dst>`    |
//! | rasterise      | `pdftoppm -jpeg -r <dpi> <pdf> <dir>/page`       |
//!
//! pdftoppm zero-pads the page number in the files it produces, so the
//! lexicographic order of the returned names equals page order once the
//! caller sorts them. The listing itself is returned unsorted — directory
//! iteration order is filesystem-dependent.

use crate::config::PageRange;
use crate::error::PdfScribeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

const PDFINFO: &str = "pdfinfo";
const QPDF: &str = "qpdf";
const PDFTOPPM: &str = "pdftoppm";

static RE_PAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").unwrap());

/// Run a prepared command to completion, mapping spawn failures and
/// non-zero exits onto the error taxonomy.
async fn run(tool: &'static str, command: &mut Command) -> Result<Output, PdfScribeError> {
    debug!("Running {:?}", command.as_std());
    let output = command
        .output()
        .await
        .map_err(|source| PdfScribeError::ToolSpawnFailed { tool, source })?;

    if !output.status.success() {
        return Err(PdfScribeError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Query the document's total page count via `pdfinfo`.
pub async fn page_count(pdf: &Path) -> Result<u32, PdfScribeError> {
    let output = run(PDFINFO, Command::new(PDFINFO).arg(pdf)).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let count = parse_page_count(&stdout)?;
    info!("Document has {} pages", count);
    Ok(count)
}

/// Pull the `Pages: <N>` line out of pdfinfo's output.
fn parse_page_count(output: &str) -> Result<u32, PdfScribeError> {
    RE_PAGES
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| PdfScribeError::PageCountUnparsable {
            output: output.to_string(),
        })
}

/// Extract `range` from `src` into a new PDF at `dst` via `qpdf`.
///
/// The range is handed to qpdf verbatim — including an inverted one, whose
/// interpretation is qpdf's business.
pub async fn extract_range(
    src: &Path,
    dst: &Path,
    range: PageRange,
) -> Result<(), PdfScribeError> {
    info!("Extracting pages {} from {}", range, src.display());
    run(
        QPDF,
        Command::new(QPDF)
            .arg(src)
            .arg("--pages")
            .arg(".")
            .arg(range.to_string())
            .arg("--")
            .arg(dst),
    )
    .await?;
    Ok(())
}

/// Render every page of `pdf` to a JPEG under `images_dir` via `pdftoppm`.
///
/// Returns the produced `.jpg` paths in unspecified order; callers sort.
pub async fn rasterize(
    pdf: &Path,
    images_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PdfScribeError> {
    info!("Rasterising {} at {} DPI", pdf.display(), dpi);
    run(
        PDFTOPPM,
        Command::new(PDFTOPPM)
            .arg("-jpeg")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(pdf)
            .arg(images_dir.join("page")),
    )
    .await?;

    let mut images = Vec::new();
    let mut entries = tokio::fs::read_dir(images_dir)
        .await
        .map_err(|e| PdfScribeError::io(format!("listing {}", images_dir.display()), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PdfScribeError::io(format!("listing {}", images_dir.display()), e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "jpg") {
            images.push(path);
        }
    }
    info!("Rasterised {} pages", images.len());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDFINFO_SAMPLE: &str = "\
Title:           Attention Is All You Need
Producer:        pdfTeX-1.40.25
CreationDate:    Wed Aug  2 01:55:06 2023 UTC
Custom Metadata: no
Form:            none
Pages:           15
Encrypted:       no
Page size:       612 x 792 pts (letter)
File size:       2215244 bytes
PDF version:     1.5
";

    #[test]
    fn parses_page_count_from_pdfinfo_output() {
        assert_eq!(parse_page_count(PDFINFO_SAMPLE).unwrap(), 15);
    }

    #[test]
    fn parses_single_page() {
        assert_eq!(parse_page_count("Pages:          1\n").unwrap(), 1);
    }

    #[test]
    fn missing_pages_line_is_an_error() {
        let err = parse_page_count("Producer: Ghostscript\nEncrypted: no\n").unwrap_err();
        assert!(matches!(err, PdfScribeError::PageCountUnparsable { .. }));
    }

    #[test]
    fn pages_must_be_a_line_of_its_own() {
        // "Pages:" appearing mid-line (say, inside a title) must not match.
        let err = parse_page_count("Title: All About Pages: 99 Ways\n").unwrap_err();
        assert!(matches!(err, PdfScribeError::PageCountUnparsable { .. }));
    }

    #[tokio::test]
    async fn missing_tool_reports_spawn_failure() {
        let err = run(
            "pdfinfo",
            &mut Command::new("definitely-not-a-real-binary-pdfscribe"),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PdfScribeError::ToolSpawnFailed { tool: "pdfinfo", .. }
        ));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_tool_failure() {
        // `false` is POSIX; skip quietly on platforms without it.
        let result = run("pdfinfo", &mut Command::new("false")).await;
        if let Err(err) = result {
            match err {
                PdfScribeError::ToolFailed { tool, status, .. } => {
                    assert_eq!(tool, "pdfinfo");
                    assert!(status.contains('1'), "status: {status}");
                }
                PdfScribeError::ToolSpawnFailed { .. } => {} // no `false` on PATH
                other => panic!("unexpected error: {other}"),
            }
        } else {
            panic!("`false` should not exit 0");
        }
    }
}
