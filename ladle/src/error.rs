//! Source locations and scanner errors.
//!
//! [`Position`] and [`Span`] mark where a token (or a grammar construct
//! reported by `ladle-gen`) sits in its source text. [`ScanError`] is what
//! the table-driven [`Lexer`](crate::Lexer) returns when the input cannot be
//! split into tokens. The `span!` macro builds an `Option<Span>` inline.
//!
//! # Examples
//!
//! ```rust
//! # use ladle::{Position, Span, span};
//! let sp = Span::new(Position::new(3, 5), Position::new(3, 10));
//! assert!(!sp.is_empty());
//! assert_eq!(sp.line_range(), (3, 3));
//! assert_eq!(sp.start.to_string(), "line 3, column 5");
//!
//! let sp_opt = span!(1, 1, 1, 5);
//! assert!(sp_opt.is_some());
//! ```

use std::fmt;
use thiserror::Error;

/// A 1-based line/column position in source text.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number (character position in the line).
    pub column: usize,
}

impl Position {
    /// Creates a new `Position`.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position of the first character of a text.
    #[inline]
    pub const fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Moves the position past `c`.
    #[inline]
    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A half-open source range: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Starting position (inclusive).
    pub start: Position,
    /// Ending position (exclusive by convention).
    pub end: Position,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Merge two spans into one that covers both.
    #[inline]
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns `true` if the span is empty (same start and end position).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the inclusive line range spanned by this `Span`.
    #[inline]
    pub fn line_range(&self) -> (usize, usize) {
        (self.start.line, self.end.line)
    }
}

/// Errors raised while scanning input with compiled scan tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// No token of the current lexical mode accepts the input at `pos`.
    #[error("lexical error at {pos}: no token in mode {mode} matches {found:?}")]
    NoMatch {
        mode: usize,
        found: char,
        pos: Position,
    },

    /// A token matched the empty string without switching lexical mode,
    /// so scanning would not make progress.
    #[error("lexical error at {pos}: token kind {kind} matches the empty string")]
    EmptyMatch { kind: usize, pos: Position },

    /// Input ended while a `MORE` prefix was still being accumulated.
    #[error("lexical error: input ended inside a token that started at {0}")]
    UnterminatedMore(Position),

    /// The tables refer to a lexical mode they do not define.
    #[error("scan tables have no lexical mode {0}")]
    UnknownMode(usize),

    /// The tables refer to a token kind they do not define.
    #[error("scan tables have no token kind {0}")]
    UnknownKind(usize),
}

/// Build an `Option<Span>` inline from 1-based line/column coordinates.
///
/// # Examples
///
/// ```rust
/// # use ladle::span;
/// let s = span!(1, 1, 1, 5);
/// assert!(s.is_some());
/// ```
#[macro_export]
macro_rules! span {
    ($line_start:expr, $col_start:expr, $line_end:expr, $col_end:expr) => {
        Some($crate::Span {
            start: $crate::Position { line: $line_start, column: $col_start },
            end:   $crate::Position { line: $line_end,   column: $col_end   },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines_and_columns() {
        let mut pos = Position::start();
        for c in "ab\ncd".chars() {
            pos.advance(c);
        }
        assert_eq!(pos, Position::new(2, 3));
    }

    #[test]
    fn merge_covers_both() {
        let a = span!(1, 4, 1, 8).unwrap();
        let b = span!(1, 2, 2, 1).unwrap();
        let m = a.merge(&b);
        assert_eq!(m.start, Position::new(1, 2));
        assert_eq!(m.end, Position::new(2, 1));
        assert_eq!(m.line_range(), (1, 2));
    }

    #[test]
    fn scan_error_messages() {
        let e = ScanError::NoMatch {
            mode: 0,
            found: '#',
            pos: Position::new(2, 7),
        };
        assert_eq!(
            e.to_string(),
            "lexical error at line 2, column 7: no token in mode 0 matches '#'"
        );
        assert_eq!(
            ScanError::UnknownMode(4).to_string(),
            "scan tables have no lexical mode 4"
        );
    }
}
