//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Grammar compiler for recursive-descent parsers.
//!
//! `ladle-gen` takes a [`Grammar`] built through its builder API and produces:
//!  * **scanner tables**: one NFA-based automaton per lexical state, with
//!    epsilon closures and optional state reduction, ready to run on
//!    [`ladle::Lexer`]
//!  * **lookahead analysis**: bounded FIRST/FOLLOW enumeration, choice
//!    conflict diagnostics, and a plan of branch decisions and scan routines
//!    for an LL(k) parser
//!
//! Problems in the grammar are collected as diagnostics on a
//! [`CompilationContext`]; [`compile`] fails if any of them is an error.
//!
//! ```
//! use ladle_gen::{Grammar, Options, Regex, TokenSpec, compile};
//!
//! let mut g = Grammar::new();
//! g.add_token(TokenSpec::labeled("NUM", Regex::range('0', '9').one_or_more()));
//! let num = g.token("NUM");
//! let plus = g.literal("+");
//! let tail = g.sequence(vec![plus, num]);
//! let more = g.zero_or_more(tail);
//! let num2 = g.token("NUM");
//! let sum = g.sequence(vec![num2, more]);
//! g.production("sum", sum);
//!
//! let compiled = compile(&mut g, Options::default()).unwrap();
//! assert!(compiled.conflicts.is_empty());
//! ```

pub mod context;
pub mod error;
pub mod generate;
pub mod grammar;
pub mod lexgen;
pub mod lookahead;
pub mod regex;
pub mod report;
pub mod symtab;

pub use context::{CompilationContext, Diagnostic, Diagnostics, Options, Severity};
pub use error::{GenError, OptionError};
pub use generate::{CompiledGrammar, compile, compile_with_context};
pub use grammar::{ExpansionKind, Grammar, LookaheadSpec, NodeId, TokenSpec};
pub use lookahead::{Decision, LookaheadPlan};
pub use regex::{CharDescriptor, Regex};
