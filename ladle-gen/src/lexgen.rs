//! Scanner construction.
//!
//! Each lexical state gets its own automaton. Token regular expressions are
//! compiled into NFA fragments hanging off one initial state
//! ([`compile`]), epsilon closures are computed and optionally reduced
//! ([`closure`]), and the states that consume input are numbered into the
//! runtime tables executed by [`ladle::Lexer`] ([`table`]).

pub mod closure;
pub mod compile;
pub mod nfa;
pub mod table;

pub use closure::compute_closures;
pub use nfa::{AutomatonState, Fragment, Nfa};
pub use table::{LexerTables, LexicalStateTable, RuntimeState, build_lexer};
