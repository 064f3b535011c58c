//! Result and error types for the runtime.

use crate::value::Value;
use probar_js::ParseError;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while loading or running modules.
///
/// All variants except [`RuntimeError::Fatal`] are catchable by a script's
/// `try`/`catch`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Value thrown by a `throw` statement
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// Operation applied to a value of the wrong type
    #[error("TypeError: {message}")]
    TypeError {
        /// Error message
        message: String,
    },

    /// Reference to an undeclared identifier
    #[error("ReferenceError: {name} is not defined")]
    ReferenceError {
        /// Identifier name
        name: String,
    },

    /// Call stack exhausted
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// `require` could not resolve a path
    #[error("Cannot find module '{path}' from '{from}'")]
    ModuleNotFound {
        /// Requested path
        path: String,
        /// Requiring module key, or `<root>`
        from: String,
    },

    /// Module or script source failed to parse
    #[error("SyntaxError in {key}: {source}")]
    Syntax {
        /// Module key or script name
        key: String,
        /// Underlying parse error
        #[source]
        source: ParseError,
    },

    /// Regular expression the engine cannot compile
    #[error("SyntaxError: Invalid regular expression: /{pattern}/: {message}")]
    RegExp {
        /// Pattern source
        pattern: String,
        /// Why it was rejected
        message: String,
    },

    /// Factory text is not a function
    #[error("Invalid factory: {reason}")]
    InvalidFactory {
        /// Why the factory was rejected
        reason: String,
    },

    /// Host error that unwinds the whole script, bypassing `try`/`catch`
    #[error("Fatal: {message}")]
    Fatal {
        /// Error message
        message: String,
    },
}

impl RuntimeError {
    /// Create a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Create a fatal host error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Whether a script `catch` clause may intercept this error.
    #[must_use]
    pub const fn is_catchable(&self) -> bool {
        !matches!(self, Self::Fatal { .. })
    }

    /// Error constructor name and message a script sees for this error.
    ///
    /// `None` for [`RuntimeError::Thrown`], whose value is passed through.
    #[must_use]
    pub fn error_parts(&self) -> Option<(&'static str, String)> {
        let parts = match self {
            Self::Thrown(_) => return None,
            Self::TypeError { message } => ("TypeError", message.clone()),
            Self::ReferenceError { name } => ("ReferenceError", format!("{name} is not defined")),
            Self::StackOverflow => ("RangeError", "Maximum call stack size exceeded".to_string()),
            Self::Syntax { source, .. } => ("SyntaxError", source.to_string()),
            Self::RegExp { pattern, message } => (
                "SyntaxError",
                format!("Invalid regular expression: /{pattern}/: {message}"),
            ),
            Self::ModuleNotFound { .. } | Self::InvalidFactory { .. } | Self::Fatal { .. } => {
                ("Error", self.to_string())
            }
        };
        Some(parts)
    }

    /// The value a `catch (e)` clause binds for this error, without
    /// prototypes. Scripts receive [`Runtime::error_value`] instead.
    ///
    /// [`Runtime::error_value`]: crate::Runtime::error_value
    #[must_use]
    pub fn into_value(self) -> Value {
        match self.error_parts() {
            Some((name, message)) => Value::error(name, &message),
            None => match self {
                Self::Thrown(value) => value,
                _ => Value::Undefined,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_is_not_catchable() {
        assert!(!RuntimeError::fatal("boom").is_catchable());
        assert!(RuntimeError::type_error("x").is_catchable());
        assert!(RuntimeError::Thrown(Value::Null).is_catchable());
    }

    #[test]
    fn display_messages() {
        let err = RuntimeError::ModuleNotFound {
            path: "./nope".into(),
            from: "math/index.js".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot find module './nope' from 'math/index.js'"
        );
        let err = RuntimeError::ReferenceError { name: "foo".into() };
        assert_eq!(err.to_string(), "ReferenceError: foo is not defined");
    }

    #[test]
    fn caught_errors_become_error_objects() {
        let value = RuntimeError::type_error("x is not a function").into_value();
        assert_eq!(value.to_js_string(), "TypeError: x is not a function");
        let thrown = RuntimeError::Thrown(Value::from("plain")).into_value();
        assert_eq!(thrown.to_js_string(), "plain");
    }

    #[test]
    fn regexp_errors_surface_as_syntax_errors() {
        let err = RuntimeError::RegExp {
            pattern: "(".into(),
            message: "unclosed group".into(),
        };
        assert_eq!(
            err.to_string(),
            "SyntaxError: Invalid regular expression: /(/: unclosed group"
        );
        assert_eq!(err.error_parts().map(|(name, _)| name), Some("SyntaxError"));
    }
}
