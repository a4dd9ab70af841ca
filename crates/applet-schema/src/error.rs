//! Error types for applet-schema

use thiserror::Error;

/// A syntax error with the position where tokenizing or parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Errors raised by strict-mode extraction.
///
/// A script without a `handler` export is not an error: extraction
/// returns `Ok(None)` for library files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The script could not be tokenized or parsed
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    /// `handler`/`actions` exists but is not a named export
    #[error("`{name}` {reason}")]
    ExportShape { name: String, reason: String },

    /// The parameter type of a callable could not be enumerated
    #[error("cannot resolve input properties of `{name}`: {reason}")]
    PropertyResolution { name: String, reason: String },

    /// Identifier chasing looped back onto a name already visited
    #[error("`{name}` resolves to itself through `{cycle}`")]
    ResolutionCycle { name: String, cycle: String },
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_position() {
        let err = ParseError::new("unterminated string literal", 3, 14);
        assert_eq!(err.to_string(), "unterminated string literal at 3:14");
    }

    #[test]
    fn extract_error_wraps_parse_error() {
        let err: ExtractError = ParseError::new("unexpected `}`", 1, 1).into();
        assert!(err.to_string().starts_with("syntax error:"));
    }

    #[test]
    fn cycle_error_names_the_chain() {
        let err = ExtractError::ResolutionCycle {
            name: "handler".to_string(),
            cycle: "handler -> a -> handler".to_string(),
        };
        assert!(err.to_string().contains("handler -> a -> handler"));
    }
}
