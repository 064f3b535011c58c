//! Error types for `probar-js`.

use thiserror::Error;

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors raised while turning source text into a syntax tree and back.
///
/// Offsets are byte offsets into the text that was handed to
/// [`parse`](crate::parse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Invalid identifier name (reserved word, invalid characters, etc.)
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier {
        /// The invalid identifier
        name: String,
        /// Why it's invalid
        reason: String,
    },

    /// The parser rejected the source
    #[error("{message} at offset {offset}")]
    Syntax {
        /// Parser diagnostic
        message: String,
        /// Byte offset
        offset: usize,
    },

    /// Brackets, prefix operators or nested statements go deeper than the limit
    #[error("Nesting deeper than {limit} levels at offset {offset}")]
    TooDeep {
        /// Maximum accepted depth
        limit: usize,
        /// Byte offset of the token that crossed the limit
        offset: usize,
    },

    /// Parsed syntax the evaluator has no semantics for
    #[error("Unsupported {construct} at offset {offset}")]
    Unsupported {
        /// What was found, e.g. `class declaration`
        construct: String,
        /// Byte offset
        offset: usize,
    },

    /// Code generation failed to write output
    #[error("Code generation failed: {message}")]
    Emit {
        /// Writer error
        message: String,
    },
}

impl ParseError {
    /// Byte offset the error points at, if any.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::InvalidIdentifier { .. } | Self::Emit { .. } => None,
            Self::Syntax { offset, .. }
            | Self::TooDeep { offset, .. }
            | Self::Unsupported { offset, .. } => Some(*offset),
        }
    }

    pub(crate) fn unsupported(construct: impl Into<String>, offset: usize) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            offset,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        Self::Emit {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_identifier() {
        let err = ParseError::InvalidIdentifier {
            name: "class".to_string(),
            reason: "reserved word".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid identifier 'class': reserved word");
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn error_display_syntax() {
        let err = ParseError::Syntax {
            message: "Expression expected".to_string(),
            offset: 12,
        };
        assert_eq!(err.to_string(), "Expression expected at offset 12");
        assert_eq!(err.offset(), Some(12));
    }

    #[test]
    fn error_display_too_deep() {
        let err = ParseError::TooDeep {
            limit: 256,
            offset: 3,
        };
        assert_eq!(err.to_string(), "Nesting deeper than 256 levels at offset 3");
        assert_eq!(err.offset(), Some(3));
    }

    #[test]
    fn io_errors_become_emit_errors() {
        let err: ParseError = std::io::Error::other("sink closed").into();
        assert!(matches!(err, ParseError::Emit { .. }));
        assert_eq!(err.offset(), None);
    }
}
