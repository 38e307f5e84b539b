//! Lookahead analysis.
//!
//! [`engine`] enumerates the token sequences an expansion can start with or
//! be followed by, bounded by a lookahead limit. [`ambiguity`] uses it to
//! report choice points a parser could not decide with the configured
//! lookahead. [`decision`] turns every choice point into a decision a parser
//! can execute, together with the scan routines those decisions call.

pub mod ambiguity;
pub mod decision;
pub mod engine;
pub mod matchinfo;

pub use ambiguity::{AmbiguityChecker, Conflict, ConflictKind};
pub use decision::{
    Branch, Decision, DecisionKind, DecisionPoint, EntryRoutine, LookaheadDecisionBuilder, LookaheadPlan,
    ScanRoutine,
};
pub use engine::{LookaheadEngine, Matches};
pub use matchinfo::MatchInfo;
