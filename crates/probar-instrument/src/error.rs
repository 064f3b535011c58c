//! Result and error types for instrumentation.

use probar_js::ParseError;
use probar_js_runtime::RuntimeError;
use thiserror::Error;

/// Result type for instrumentation operations
pub type Result<T> = std::result::Result<T, InstrumentError>;

/// Errors that can occur while instrumenting a component or recording coverage
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// A module's source could not be parsed
    #[error("Failed to parse module '{key}': {source}")]
    Parse {
        /// Module key
        key: String,
        /// Underlying parse error
        #[source]
        source: ParseError,
    },

    /// A module's instrumented tree could not be printed
    #[error("Failed to generate instrumented source for '{key}': {source}")]
    Generate {
        /// Module key
        key: String,
        /// Underlying code generation error
        #[source]
        source: ParseError,
    },

    /// The recorder was called with a key the session never registered
    #[error("Unknown module '{key}'")]
    UnknownModule {
        /// Key passed to the recorder
        key: String,
    },

    /// The recorder was called with malformed arguments
    #[error("Invalid recorder call: {reason}")]
    InvalidCall {
        /// What was wrong with the arguments
        reason: String,
    },

    /// A caller-supplied recorder name is not a valid identifier
    #[error("Invalid recorder name '{name}': {reason}")]
    InvalidRecorderName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The recorder name is already bound in the global namespace
    #[error("Recorder name '{name}' is already bound in the global namespace")]
    RecorderNameTaken {
        /// Name in use
        name: String,
    },

    /// Runtime failure while patching or loading
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InstrumentError {
    /// Create an invalid recorder call error.
    pub fn invalid_call(reason: impl Into<String>) -> Self {
        Self::InvalidCall {
            reason: reason.into(),
        }
    }

    /// Surface this error to a running script as an uncatchable failure.
    #[must_use]
    pub fn into_fatal(self) -> RuntimeError {
        RuntimeError::fatal(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = InstrumentError::UnknownModule {
            key: "math/nope.js".into(),
        };
        assert_eq!(err.to_string(), "Unknown module 'math/nope.js'");

        let err = InstrumentError::RecorderNameTaken {
            name: "__cov".into(),
        };
        assert!(err.to_string().contains("__cov"));
    }

    #[test]
    fn parse_error_is_chained() {
        let source = probar_js::parse("var = 1;").unwrap_err();
        let err = InstrumentError::Parse {
            key: "m/index.js".into(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Failed to parse module 'm/index.js'"));
    }

    #[test]
    fn nesting_failures_name_the_module() {
        let depth = probar_js::MAX_NESTING_DEPTH + 1;
        let source = probar_js::parse(&"[".repeat(depth)).unwrap_err();
        let err = InstrumentError::Parse {
            key: "m/deep.js".into(),
            source,
        };
        assert!(err.to_string().contains("m/deep.js"));
        assert!(err.to_string().contains("Nesting deeper than"));
    }

    #[test]
    fn fatal_conversion_bypasses_catch() {
        let err = InstrumentError::invalid_call("start must be a number").into_fatal();
        assert!(!err.is_catchable());
        assert_eq!(
            err.to_string(),
            "Fatal: Invalid recorder call: start must be a number"
        );
    }
}
