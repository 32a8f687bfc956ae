//! Source location tracking for error reporting.
//!
//! A [`Span`] is a contiguous byte-offset range into whichever input buffer
//! is currently being scanned (command line, property list, parameter file,
//! or an environment-substituted copy of one of those). Every token, every
//! bound value, and every error carries a `Span` so diagnostics can point at
//! the exact offending text with a `^`-underline.
//!
//! ```
//! use clp::span::Span;
//!
//! let source = "NUM08=42";
//! let span = Span::new(6, 8);
//! assert_eq!(&source[span.start..span.end], "42");
//! ```

/// A byte-offset range in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    /// Byte offset of the first character (inclusive).
    pub start: usize,
    /// Byte offset past the last character (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a span from byte offsets. No validation is performed.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-length span at `pos`, used for "error occurred right here"
    /// diagnostics that don't have a natural end offset (e.g. end-of-input).
    pub fn point(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    /// Span covering from the start of `self` to the end of `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// `true` if this span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_stores_positions() {
        let span = Span::new(5, 10);
        assert_eq!(span.start, 5);
        assert_eq!(span.end, 10);
    }

    #[test]
    fn span_merge_combines_ranges() {
        let a = Span::new(5, 10);
        let b = Span::new(8, 15);
        let merged = a.merge(b);
        assert_eq!(merged.start, 5);
        assert_eq!(merged.end, 15);
    }

    #[test]
    fn span_point_is_empty() {
        let p = Span::point(7);
        assert!(p.is_empty());
        assert_eq!(p.start, 7);
        assert_eq!(p.end, 7);
    }

    #[test]
    fn span_len_returns_size() {
        assert_eq!(Span::new(5, 10).len(), 5);
    }
}
