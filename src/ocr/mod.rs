pub mod tesseract;

use std::io::Cursor;

use async_trait::async_trait;
use image::ImageReader;

use crate::capture::CaptureArtifact;
use crate::error::OcrError;

pub use tesseract::TesseractOcr;

/// Turns a screenshot into text. Takes the artifact by value so it is
/// released as soon as recognition finishes.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, artifact: CaptureArtifact) -> Result<ExtractedText, OcrError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub word_count: usize,
}

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self { text, word_count }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Rejects artifacts whose bytes are not a decodable image header.
pub fn ensure_readable(artifact: &CaptureArtifact) -> Result<(u32, u32), OcrError> {
    ImageReader::new(Cursor::new(artifact.png_bytes()))
        .with_guessed_format()
        .map_err(|e| OcrError::UnreadableImage {
            reason: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| OcrError::UnreadableImage {
            reason: e.to_string(),
        })
}

/// Cleans raw engine output: strips form feeds and trailing spaces, drops
/// blank lines at either end. Inner blank lines are kept.
pub fn normalize_output(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(|line| line.trim_end_matches(|c: char| c == '\u{c}' || c.is_whitespace()))
        .map(|line| line.trim_start_matches('\u{c}'))
        .collect();

    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words() {
        let text = ExtractedText::new("hello  brave\nnew world");
        assert_eq!(text.word_count, 4);
        assert!(!text.is_empty());
        assert!(ExtractedText::new(" \n ").is_empty());
    }

    #[test]
    fn normalizes_engine_output() {
        let raw = "\n\n  Title  \nbody line   \n\nsecond para\n\n\u{c}";
        assert_eq!(normalize_output(raw), "  Title\nbody line\n\nsecond para");
    }

    #[test]
    fn blank_output_is_empty() {
        assert_eq!(normalize_output("\n \n\u{c}\n"), "");
    }
}
