//! The compilation driver.
//!
//! [`compile`] runs the phases over a built [`Grammar`]: linking and tree
//! checks, the scanner build, the ambiguity check and the lookahead plan.

use crate::context::{CompilationContext, Diagnostic, Options, Severity};
use crate::error::GenError;
use crate::grammar::{ExpansionKind, Grammar};
use crate::lexgen::{LexerTables, build_lexer};
use crate::lookahead::{AmbiguityChecker, Conflict, LookaheadDecisionBuilder, LookaheadPlan};
use anyhow::{Result, bail};

/// The output of a compilation.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub lexer: LexerTables,
    pub plan: LookaheadPlan,
    pub conflicts: Vec<Conflict>,
    pub diagnostics: Vec<Diagnostic>,
    pub warning_count: usize,
    pub error_count: usize,
}

/// Compiles `grammar` and fails if any semantic error was reported.
pub fn compile(grammar: &mut Grammar, options: Options) -> Result<CompiledGrammar> {
    let mut ctx = CompilationContext::new(options);
    let compiled = compile_with_context(grammar, &mut ctx)?;
    if compiled.error_count > 0 {
        let first = compiled
            .diagnostics
            .iter()
            .find(|d| d.severity == Severity::SemanticError)
            .map(|d| d.to_string())
            .unwrap_or_default();
        bail!(
            "grammar has {} error(s) and {} warning(s); first: {}",
            compiled.error_count,
            compiled.warning_count,
            first
        );
    }
    Ok(compiled)
}

/// Compiles `grammar`, recording diagnostics on `ctx`. Semantic errors do
/// not fail the call; only a [`GenError`] does.
///
/// The grammar is linked unless [`Grammar::link`] has already been run.
pub fn compile_with_context(grammar: &mut Grammar, ctx: &mut CompilationContext) -> Result<CompiledGrammar, GenError> {
    check_node_ids(grammar)?;
    if !grammar.is_linked() {
        grammar.link(ctx);
    }

    let lexer = build_lexer(grammar, ctx)?;

    let conflicts = if (ctx.options.lookahead == 1 || ctx.options.force_la_check) && !ctx.has_errors() {
        AmbiguityChecker::new(grammar, ctx).check_all()
    } else {
        Vec::new()
    };

    let plan = LookaheadDecisionBuilder::new(grammar, &ctx.options).build();

    log::debug!(
        "compiled grammar: {} lexical states, {} conflicts, {} warnings, {} errors",
        lexer.states.len(),
        conflicts.len(),
        ctx.diagnostics.warning_count(),
        ctx.diagnostics.error_count()
    );
    Ok(CompiledGrammar {
        lexer,
        plan,
        conflicts,
        diagnostics: ctx.diagnostics.iter().cloned().collect(),
        warning_count: ctx.diagnostics.warning_count(),
        error_count: ctx.diagnostics.error_count(),
    })
}

/// Every node id stored in the grammar must name one of its nodes.
fn check_node_ids(grammar: &Grammar) -> Result<(), GenError> {
    let n = grammar.nodes.len();
    let roots = grammar.productions.iter().filter_map(|p| p.expansion);
    let inner = grammar.nodes.iter().flat_map(|e| match &e.kind {
        ExpansionKind::Choice(v) | ExpansionKind::Sequence(v) => v.clone(),
        ExpansionKind::OneOrMore(b) | ExpansionKind::ZeroOrMore(b) | ExpansionKind::ZeroOrOne(b) => vec![*b],
        ExpansionKind::Lookahead(spec) => spec.expansion.into_iter().collect(),
        _ => Vec::new(),
    });
    match roots.chain(inner).find(|&id| id >= n) {
        Some(id) => Err(GenError::UnknownNode(id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenSpec;
    use crate::lookahead::Decision;
    use crate::regex::{CharDescriptor, Regex};
    use ladle::{Lexer, TokenAction};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// `start ::= ( "let" <ID> "=" <NUM> ";" )*`
    fn assignments() -> Grammar {
        let mut g = Grammar::new();
        g.add_token(TokenSpec::new(Regex::chars(&[CharDescriptor::Single(' ')])).action(TokenAction::Skip));
        let kw = g.literal("let");
        g.add_token(TokenSpec::labeled("ID", Regex::range('a', 'z').one_or_more()));
        g.add_token(TokenSpec::labeled("NUM", Regex::range('0', '9').one_or_more()));
        let id = g.token("ID");
        let eq = g.literal("=");
        let num = g.token("NUM");
        let semi = g.literal(";");
        let stmt = g.sequence(vec![kw, id, eq, num, semi]);
        let all = g.zero_or_more(stmt);
        let eof = g.eof();
        let top = g.sequence(vec![all, eof]);
        g.production("start", top);
        g
    }

    #[test]
    fn compiles_scanner_and_plan() {
        init_logger();
        let mut g = assignments();
        let compiled = compile(&mut g, Options::default()).unwrap();
        assert_eq!(compiled.error_count, 0);
        assert!(compiled.conflicts.is_empty());

        let tables = compiled.lexer.to_scan_tables();
        let kinds: Vec<usize> = Lexer::new(&tables, "let x = 42;")
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![2, 3, 5, 4, 6, 0]);

        assert_eq!(compiled.plan.decisions.len(), 1);
        assert_eq!(compiled.plan.decisions[0].branches[0].decision, Decision::Switch(vec![2]));
    }

    #[test]
    fn semantic_errors_fail_compile() {
        init_logger();
        let mut g = Grammar::new();
        let x = g.literal("x");
        let missing = g.nonterminal("missing");
        let top = g.sequence(vec![x, missing]);
        g.production("start", top);
        let err = compile(&mut g.clone(), Options::default()).unwrap_err();
        assert!(err.to_string().contains("Non-terminal missing has not been defined."));

        let mut ctx = CompilationContext::default();
        let compiled = compile_with_context(&mut g, &mut ctx).unwrap();
        assert_eq!(compiled.error_count, 1);
        assert!(compiled.conflicts.is_empty());
        assert!(ctx.diagnostics.mentions("has not been defined"));
    }

    #[test]
    fn ambiguity_check_follows_lookahead_option() {
        init_logger();
        let build = || {
            let mut g = Grammar::new();
            let x = g.literal("x");
            let b = g.literal("b");
            let xb = g.sequence(vec![x, b]);
            let x2 = g.literal("x");
            let c = g.literal("c");
            let xc = g.sequence(vec![x2, c]);
            let choice = g.choice(vec![xb, xc]);
            g.production("start", choice);
            g
        };

        let compiled = compile(&mut build(), Options::default()).unwrap();
        assert_eq!(compiled.conflicts.len(), 1);
        assert_eq!(compiled.warning_count, 1);

        let deeper = Options {
            lookahead: 2,
            ..Options::default()
        };
        let compiled = compile(&mut build(), deeper.clone()).unwrap();
        assert!(compiled.conflicts.is_empty());
        assert_eq!(compiled.plan.entry_routines.len(), 2);

        let forced = Options {
            force_la_check: true,
            ..deeper
        };
        let compiled = compile(&mut build(), forced).unwrap();
        assert_eq!(compiled.conflicts.len(), 1);
    }

    #[test]
    fn empty_character_set_fails_compile() {
        init_logger();
        let mut g = Grammar::new();
        g.add_token(TokenSpec::labeled("NOTHING", Regex::chars(&[])));
        let x = g.literal("x");
        g.production("start", x);
        let err = compile(&mut g.clone(), Options::default()).unwrap_err();
        assert!(err.to_string().contains("Empty character set is not allowed"));

        let mut ctx = CompilationContext::default();
        let compiled = compile_with_context(&mut g, &mut ctx).unwrap();
        assert_eq!(compiled.error_count, 1);
        assert_eq!(compiled.lexer.states.len(), 1);
    }

    #[test]
    fn foreign_node_ids_are_rejected() {
        init_logger();
        let mut g = Grammar::new();
        g.production("start", 99);
        let mut ctx = CompilationContext::default();
        assert_eq!(
            compile_with_context(&mut g, &mut ctx).unwrap_err(),
            GenError::UnknownNode(99)
        );
    }
}
