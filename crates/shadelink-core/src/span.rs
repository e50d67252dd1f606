//! Source location tracking for diagnostics.
//!
//! Provides [`Span`] to record where a token, declaration or error starts in a
//! module's source text.

use std::fmt;

/// A span of source code, represented by its starting position.
///
/// Lines and columns are 1-indexed; columns count bytes. A default span
/// (`0:0`) means "no location", which is what composition-time diagnostics
/// use when the conflict is not tied to a single token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span from a line, column, and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether this span carries a real location.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.line != 0
    }

    /// Extend this span so that it ends where `other` ends.
    ///
    /// Only the length is adjusted when both spans share a line; spans on
    /// different lines keep the starting position and sum their lengths.
    pub fn to(self, other: Span) -> Span {
        if self.line == other.line && other.col >= self.col {
            Span::new(self.line, self.col, other.col + other.len - self.col)
        } else {
            Span::new(self.line, self.col, self.len + other.len)
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_span_is_unknown() {
        assert!(!Span::default().is_known());
        assert!(Span::point(1, 1).is_known());
    }

    #[test]
    fn span_to_same_line() {
        let start = Span::new(4, 3, 7); // "Texture"
        let end = Span::new(4, 20, 1); // ";"
        let joined = start.to(end);
        assert_eq!(joined.line, 4);
        assert_eq!(joined.col, 3);
        assert_eq!(joined.len, 18);
    }

    #[test]
    fn span_to_next_line() {
        let joined = Span::new(1, 5, 4).to(Span::new(2, 1, 2));
        assert_eq!((joined.line, joined.col, joined.len), (1, 5, 6));
    }

    #[test]
    fn span_display() {
        assert_eq!(Span::new(12, 9, 2).to_string(), "12:9");
    }
}
