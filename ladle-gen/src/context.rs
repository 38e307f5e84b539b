//! Options, diagnostics and the per-compilation context.
//!
//! A [`CompilationContext`] is created for each compilation and passed by
//! reference to every phase. It owns the [`Options`] and collects
//! [`Diagnostic`]s, so independent compilations never share state.

use crate::error::OptionError;
use ladle::Position;
use smartstring::alias::String;
use std::fmt;

/// Options consumed by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Match every token case-insensitively.
    pub ignore_case: bool,
    /// Default number of tokens examined at a choice point.
    pub lookahead: usize,
    /// Deepest lookahead tried when diagnosing choice conflicts.
    pub choice_ambiguity_check: usize,
    /// Deepest lookahead tried when diagnosing `(...)*`, `(...)+` and `[...]`.
    pub other_ambiguity_check: usize,
    /// Check choice points even where an explicit lookahead is given.
    pub force_la_check: bool,
    /// Run the heuristic state merging pass after epsilon closure.
    pub reduce_states: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_case: false,
            lookahead: 1,
            choice_ambiguity_check: 2,
            other_ambiguity_check: 1,
            force_la_check: false,
            reduce_states: true,
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, OptionError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(OptionError::BadValue {
            name,
            expected: "true or false",
            value: value.into(),
        }),
    }
}

fn parse_int(name: &'static str, value: &str) -> Result<usize, OptionError> {
    value.trim().parse().map_err(|_| OptionError::BadValue {
        name,
        expected: "a non-negative integer",
        value: value.into(),
    })
}

impl Options {
    /// Sets an option from its grammar-file spelling, e.g.
    /// `set("LOOKAHEAD", "2")`. Names are case-insensitive.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        match name.to_ascii_uppercase().as_str() {
            "IGNORE_CASE" => self.ignore_case = parse_bool("IGNORE_CASE", value)?,
            "LOOKAHEAD" => {
                let n = parse_int("LOOKAHEAD", value)?;
                if n == 0 {
                    return Err(OptionError::ZeroLookahead);
                }
                self.lookahead = n;
            }
            "CHOICE_AMBIGUITY_CHECK" => {
                self.choice_ambiguity_check = parse_int("CHOICE_AMBIGUITY_CHECK", value)?
            }
            "OTHER_AMBIGUITY_CHECK" => {
                self.other_ambiguity_check = parse_int("OTHER_AMBIGUITY_CHECK", value)?
            }
            "FORCE_LA_CHECK" => self.force_la_check = parse_bool("FORCE_LA_CHECK", value)?,
            "REDUCE_STATES" => self.reduce_states = parse_bool("REDUCE_STATES", value)?,
            _ => return Err(OptionError::Unknown(name.into())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    SemanticError,
}

/// One reported problem in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "Warning",
            Severity::SemanticError => "Error",
        };
        write!(f, "{}: {}: {}", label, self.position, self.message)
    }
}

/// Diagnostics sink with running counters.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
    warnings: usize,
    errors: usize,
}

impl Diagnostics {
    pub fn warning(&mut self, position: Position, message: impl Into<String>) {
        let d = Diagnostic {
            severity: Severity::Warning,
            position,
            message: message.into(),
        };
        log::warn!("{}", d);
        self.warnings += 1;
        self.list.push(d);
    }

    pub fn semantic_error(&mut self, position: Position, message: impl Into<String>) {
        let d = Diagnostic {
            severity: Severity::SemanticError,
            position,
            message: message.into(),
        };
        log::error!("{}", d);
        self.errors += 1;
        self.list.push(d);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.list.iter()
    }

    /// Returns `true` if any diagnostic message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.list.iter().any(|d| d.message.contains(needle))
    }
}

/// State owned by exactly one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    pub options: Options,
    pub diagnostics: Diagnostics,
}

impl CompilationContext {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            diagnostics: Diagnostics::default(),
        }
    }

    #[inline]
    pub fn warning(&mut self, position: Position, message: impl Into<String>) {
        self.diagnostics.warning(position, message);
    }

    #[inline]
    pub fn semantic_error(&mut self, position: Position, message: impl Into<String>) {
        self.diagnostics.semantic_error(position, message);
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.error_count() > 0
    }
}
