//! Result types returned by a conversion run.
//!
//! [`ConversionOutput`] carries the assembled Markdown plus per-page results
//! and run statistics, so callers can distinguish "every page transcribed"
//! from "page 7 degraded to an empty fragment" without re-parsing anything.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The complete result of one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Assembled Markdown: each page's transcription followed by a
    /// blank-line separator, in page order.
    pub markdown: String,
    /// Per-page results in page order.
    pub pages: Vec<PageResult>,
    /// Aggregate statistics for the run.
    pub stats: ConversionStats,
}

/// Result of transcribing a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number within the processed range.
    pub page_num: usize,
    /// The transcribed Markdown; empty when the page degraded on failure.
    pub markdown: String,
    /// Wall-clock duration of the transcription call(s) for this page.
    pub duration_ms: u64,
    /// Retries performed (0 means the first attempt succeeded).
    pub retries: u32,
    /// Set when the page failed after every attempt.
    pub error: Option<PageError>,
}

/// Aggregate statistics for a conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Page count of the input document (before range restriction).
    pub total_pages: usize,
    /// Pages transcribed successfully.
    pub processed_pages: usize,
    /// Pages that failed every attempt and degraded to an empty fragment.
    pub failed_pages: usize,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent in the external rasterisation tool.
    pub raster_duration_ms: u64,
    /// Time spent in completion calls (including retries and backoff).
    pub transcribe_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_round_trips_through_json() {
        let out = ConversionOutput {
            markdown: "# Page 1\n\n".into(),
            pages: vec![PageResult {
                page_num: 1,
                markdown: "# Page 1\n".into(),
                duration_ms: 1200,
                retries: 0,
                error: None,
            }],
            stats: ConversionStats {
                total_pages: 1,
                processed_pages: 1,
                ..ConversionStats::default()
            },
        };
        let json = serde_json::to_string(&out).unwrap();
        let back: ConversionOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pages.len(), 1);
        assert_eq!(back.stats.processed_pages, 1);
    }
}
