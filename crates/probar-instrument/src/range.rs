//! Byte ranges of instrumented statements.

use probar_js::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `[start, end)` byte offsets of a statement in its module's source.
///
/// Serializes as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct Range {
    /// First byte of the statement
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl Range {
    /// Create a range.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Map key used by the covered and uncovered sets: `"start:end"`.
    #[must_use]
    pub fn key(self) -> String {
        range_key(self.start, self.end)
    }

    /// Text of this range within `source`, if it lies on char boundaries.
    #[must_use]
    pub fn slice(self, source: &str) -> Option<&str> {
        source.get(self.start..self.end)
    }
}

/// Format a `"start:end"` range key.
#[must_use]
pub fn range_key(start: usize, end: usize) -> String {
    format!("{start}:{end}")
}

impl From<Span> for Range {
    fn from(span: Span) -> Self {
        Self::new(span.start, span.end)
    }
}

impl From<[usize; 2]> for Range {
    fn from([start, end]: [usize; 2]) -> Self {
        Self::new(start, end)
    }
}

impl From<Range> for [usize; 2] {
    fn from(range: Range) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert_eq!(Range::new(1, 32).key(), "1:32");
        assert_eq!(Range::new(68, 81).to_string(), "68:81");
    }

    #[test]
    fn from_span() {
        assert_eq!(Range::from(Span::new(3, 9)), Range::new(3, 9));
    }

    #[test]
    fn slices_source() {
        let source = "a();\nb();";
        assert_eq!(Range::new(5, 9).slice(source), Some("b();"));
        assert_eq!(Range::new(5, 99).slice(source), None);
    }

    #[test]
    fn serializes_as_pair() {
        let json = serde_json::to_string(&Range::new(36, 85)).unwrap();
        assert_eq!(json, "[36,85]");
        let back: Range = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Range::new(36, 85));
    }
}
