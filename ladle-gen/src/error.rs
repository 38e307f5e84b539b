//! # Generator Error Types
//!
//! [`GenError`] covers failures that abort a grammar compilation outright.
//! Problems in the grammar itself are not errors in this sense: they are
//! recorded as diagnostics on the
//! [`CompilationContext`](crate::CompilationContext) and compilation goes on
//! with a local fallback. Only a broken internal invariant, or a caller
//! handing the compiler inconsistent input, ends up here.
//!
//! [`OptionError`] is returned by [`Options::set`](crate::Options::set).
use smartstring::alias::String;
use thiserror::Error;

/// Errors that stop a compilation immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    /// An internal invariant was violated. This is a bug in the compiler,
    /// not in the grammar.
    #[error("internal error: {0}")]
    Internal(String),

    /// An expansion node id does not belong to the grammar.
    #[error("expansion node {0} does not exist")]
    UnknownNode(usize),
}

/// Errors raised while setting an option by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("unknown option {0:?}")]
    Unknown(String),

    #[error("option {name} expects {expected}, got {value:?}")]
    BadValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("option LOOKAHEAD must be at least 1")]
    ZeroLookahead,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            GenError::Internal("merging a move table with itself".into()).to_string(),
            "internal error: merging a move table with itself"
        );
        let e = OptionError::BadValue {
            name: "LOOKAHEAD",
            expected: "a non-negative integer",
            value: "two".into(),
        };
        assert_eq!(
            e.to_string(),
            "option LOOKAHEAD expects a non-negative integer, got \"two\""
        );
    }
}
