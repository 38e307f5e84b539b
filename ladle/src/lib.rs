//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Runtime support for scanners compiled by `ladle-gen`.
//!
//! The crate provides source positions and spans, the [`ScanError`] type, and
//! a table-driven [`Lexer`] that executes the per-mode automata described by
//! [`ScanTables`].

mod error;
mod lexer;

pub use crate::error::{Position, ScanError, Span};
pub use crate::lexer::{
    EOF_KIND, KindInfo, Lexer, LexerStats, ScanMode, ScanState, ScanTables, Token, TokenAction,
};
