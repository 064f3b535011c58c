//! Byte ranges in parsed source text.

use swc_core::common::BytePos;

/// Position swc assigns to the first byte of a parsed source.
///
/// `BytePos(0)` is reserved for synthesized nodes, so parsing starts one
/// past it and every conversion back to an offset subtracts this base.
pub(crate) const BASE: u32 = 1;

/// Byte range `[start, end)` in the parsed source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Offset of the first byte
    pub start: usize,
    /// Offset one past the last byte
    pub end: usize,
}

impl Span {
    /// Span used for synthesized nodes.
    pub const DUMMY: Self = Self { start: 0, end: 0 };

    /// Create a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Whether this is the span of a synthesized node.
    #[must_use]
    pub const fn is_dummy(self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// The text this span covers in `source`.
    #[must_use]
    pub fn slice(self, source: &str) -> Option<&str> {
        source.get(self.start..self.end)
    }
}

impl From<swc_core::common::Span> for Span {
    /// Synthesized swc nodes (`DUMMY_SP`) map to [`Span::DUMMY`].
    fn from(span: swc_core::common::Span) -> Self {
        if span.lo.0 == 0 && span.hi.0 == 0 {
            return Self::DUMMY;
        }
        Self::new(offset(span.lo), offset(span.hi))
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Byte offset of an swc position produced by [`parse`](crate::parse).
#[must_use]
pub fn offset(pos: BytePos) -> usize {
    pos.0.saturating_sub(BASE) as usize
}
