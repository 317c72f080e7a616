//! Prompts for the per-page transcription call.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tweaking how tables or formulas are
//!    requested means editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the prompt without spinning
//!    up a real model, making prompt regressions easy to catch.
//!
//! Callers can prepend their own system turn via
//! [`crate::config::ConversionConfig::system_prompt`]; the user-turn prompt
//! below is fixed.

/// The user message sent with every page image.
pub const PAGE_TRANSCRIPTION_PROMPT: &str = "\
Transcribe the content of this page image into Markdown.

- Reproduce all text in reading order.
- Use #, ##, ### heading levels matching the visual hierarchy of headings.
- Render mathematical formulas in LaTeX: $inline$ and $$display$$.
- Convert tables to GFM pipe tables, preserving the row and column structure.
- Output only the Markdown content, with no commentary.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_covers_headings_formulas_and_tables() {
        for needle in ["Markdown", "heading", "formula", "table"] {
            assert!(
                PAGE_TRANSCRIPTION_PROMPT.to_lowercase().contains(needle),
                "prompt should mention {needle}"
            );
        }
    }
}
