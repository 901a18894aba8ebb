//! # Extraction Error Types Module
//!
//! This module defines the error types used by the needed-item extractor.
//! Noise in the input is never an error; these only cover guard rails and
//! collaborator failures.

/// Custom error types for extraction operations
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Input exceeded the configured character limit under `OverflowPolicy::Reject`
    InputTooLarge { chars: usize, max: usize },
    /// A custom vocabulary produced a pattern that does not compile
    InvalidPattern(String),
    /// The morphological tokenizer could not be used
    TokenizerUnavailable(String),
    /// The to-do sink refused a write
    Sink(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::InputTooLarge { chars, max } => {
                write!(f, "Input too large: {chars} characters (limit {max})")
            }
            ExtractionError::InvalidPattern(msg) => write!(f, "Invalid pattern: {msg}"),
            ExtractionError::TokenizerUnavailable(msg) => {
                write!(f, "Tokenizer unavailable: {msg}")
            }
            ExtractionError::Sink(msg) => write!(f, "Sink error: {msg}"),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<regex::Error> for ExtractionError {
    fn from(err: regex::Error) -> Self {
        ExtractionError::InvalidPattern(err.to_string())
    }
}

impl From<anyhow::Error> for ExtractionError {
    fn from(err: anyhow::Error) -> Self {
        ExtractionError::Sink(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ExtractionError::InputTooLarge { chars: 60_000, max: 50_000 };
        assert_eq!(
            err.to_string(),
            "Input too large: 60000 characters (limit 50000)"
        );
        assert!(ExtractionError::TokenizerUnavailable("dictionary missing".into())
            .to_string()
            .contains("dictionary missing"));
    }

    #[test]
    fn test_regex_error_conversion() {
        let err: ExtractionError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, ExtractionError::InvalidPattern(_)));
    }
}
