use ladle::{Lexer, TokenAction};
use ladle_gen::lexgen::compute_closures;
use ladle_gen::lookahead::{ConflictKind, LookaheadDecisionBuilder, LookaheadEngine};
use ladle_gen::{CharDescriptor, CompiledGrammar, Grammar, LookaheadSpec, NodeId, Options, Regex, TokenSpec, compile};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn identifiers() -> Grammar {
    let mut g = Grammar::new();
    g.add_token(
        TokenSpec::new(Regex::chars(&[CharDescriptor::Single(' '), CharDescriptor::Single('\t')]))
            .action(TokenAction::Skip),
    );
    g.add_token(TokenSpec::labeled("IF", Regex::literal("if")));
    g.add_token(TokenSpec::labeled(
        "ID",
        Regex::Sequence(vec![
            Regex::chars(&[CharDescriptor::Range('a', 'z'), CharDescriptor::Single('_')]),
            Regex::chars(&[
                CharDescriptor::Range('a', 'z'),
                CharDescriptor::Range('0', '9'),
                CharDescriptor::Single('_'),
            ])
            .zero_or_more(),
        ]),
    ));
    g.add_token(TokenSpec::labeled("NUM", Regex::range('0', '9').one_or_more()));
    let id = g.token("ID");
    let num = g.token("NUM");
    let atom = g.choice(vec![id, num]);
    let body = g.one_or_more(atom);
    g.production("start", body);
    g
}

fn kinds(compiled: &CompiledGrammar, input: &str) -> Vec<usize> {
    let tables = compiled.lexer.to_scan_tables();
    Lexer::new(&tables, input)
        .tokenize_all()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn compilation_is_deterministic() {
    init_logger();
    for reduce in [true, false] {
        let options = Options {
            reduce_states: reduce,
            ..Options::default()
        };
        let a = compile(&mut identifiers(), options.clone()).unwrap();
        let b = compile(&mut identifiers(), options).unwrap();
        assert_eq!(a.lexer.states.len(), b.lexer.states.len());
        for (sa, sb) in a.lexer.states.iter().zip(&b.lexer.states) {
            assert_eq!(sa.runtime.len(), sb.runtime.len());
            assert_eq!(sa.to_scan_mode(), sb.to_scan_mode());
        }
        assert_eq!(a.plan, b.plan);
    }
}

#[test]
fn closure_is_a_fixed_point() {
    init_logger();
    let compiled = compile(&mut identifiers(), Options::default()).unwrap();
    let closed = &compiled.lexer.states[0].nfa;
    let mut again = closed.clone();
    compute_closures(&mut again, false).unwrap();
    assert_eq!(again.len(), closed.len());
    for (x, y) in again.states.iter().zip(&closed.states) {
        assert_eq!(x.epsilon_moves, y.epsilon_moves);
        assert_eq!(x.kind, y.kind);
    }
}

#[test]
fn longest_match_then_lowest_ordinal() {
    init_logger();
    let compiled = compile(&mut identifiers(), Options::default()).unwrap();
    assert_eq!(kinds(&compiled, "if iffy x1 42"), vec![2, 3, 3, 4, 0]);
}

#[test]
fn longer_literal_matches_in_full() {
    init_logger();
    let mut g = Grammar::new();
    g.add_token(TokenSpec::labeled("A", Regex::literal("for")));
    g.add_token(TokenSpec::labeled("B", Regex::literal("format")));
    let a = g.token("A");
    let b = g.token("B");
    let either = g.choice(vec![a, b]);
    g.production("start", either);
    let compiled = compile(&mut g, Options::default()).unwrap();

    let tables = compiled.lexer.to_scan_tables();
    let tokens = Lexer::new(&tables, "format").tokenize_all().unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, 2);
    assert_eq!(tokens[0].image, "format");
    assert_eq!(kinds(&compiled, "for"), vec![1, 0]);
}

/// `A ::= "x" B | <second> C`, `B ::= "b"`, `C ::= "c"`
fn two_way(second: &str, lookahead: Option<LookaheadSpec>) -> Grammar {
    let mut g = Grammar::new();
    let x = g.literal("x");
    let b = g.nonterminal("B");
    let first = match lookahead {
        Some(spec) => g.sequence_with(spec, vec![x, b]),
        None => g.sequence(vec![x, b]),
    };
    let s = g.literal(second);
    let c = g.nonterminal("C");
    let other = g.sequence(vec![s, c]);
    let choice = g.choice(vec![first, other]);
    g.production("A", choice);
    let lb = g.literal("b");
    g.production("B", lb);
    let lc = g.literal("c");
    g.production("C", lc);
    g
}

#[test]
fn shared_prefix_is_reported() {
    init_logger();
    let mut g = two_way("x", None);
    let compiled = compile(&mut g, Options::default()).unwrap();
    assert_eq!(compiled.conflicts.len(), 1);
    let conflict = &compiled.conflicts[0];
    assert!(matches!(conflict.kind, ConflictKind::Choice { .. }));
    assert_eq!(conflict.prefix, vec![1]);
    assert_eq!(conflict.required_lookahead, 2);
    assert!(conflict.within_bound);
    assert!(
        compiled
            .diagnostics
            .iter()
            .any(|d| d.message.contains("A common prefix is: \"x\""))
    );
}

#[test]
fn distinct_prefixes_are_not_reported() {
    init_logger();
    let mut g = two_way("y", None);
    let compiled = compile(&mut g, Options::default()).unwrap();
    assert!(compiled.conflicts.is_empty());
    assert_eq!(compiled.warning_count, 0);
}

#[test]
fn explicit_lookahead_suppresses_warning() {
    init_logger();
    let mut g = two_way("x", Some(LookaheadSpec::tokens(2)));
    let compiled = compile(&mut g, Options::default()).unwrap();
    assert!(compiled.conflicts.is_empty());
    assert_eq!(compiled.warning_count, 0);
}

/// `A ::= "(" A ")" | "x"`
fn nested() -> (Grammar, NodeId) {
    let mut g = Grammar::new();
    let open = g.literal("(");
    let inner = g.nonterminal("A");
    let close = g.literal(")");
    let paren = g.sequence(vec![open, inner, close]);
    let x = g.literal("x");
    let choice = g.choice(vec![paren, x]);
    g.production("A", choice);
    (g, inner)
}

#[test]
fn follow_terminates_on_recursion() {
    init_logger();
    let (mut g, inner) = nested();
    let compiled = compile(&mut g, Options::default()).unwrap();
    assert_eq!(compiled.error_count, 0);

    let mut engine = LookaheadEngine::new(&g);
    for limit in 1..=3 {
        let follow = engine.follow_sequences(inner, limit);
        assert!(!follow.is_empty());
        assert!(follow.iter().all(|s| !s.is_empty() && s.len() <= limit));
        assert!(follow.iter().all(|s| s[0] == 2));
    }
}

/// `P ::= "a" P "b" P "c" P | "b" <tail>`
fn interleaved(tail: bool) -> (Grammar, NodeId) {
    let mut g = Grammar::new();
    let a = g.literal("a");
    let first = g.nonterminal("P");
    let b = g.literal("b");
    let second = g.nonterminal("P");
    let c = g.literal("c");
    let last = g.nonterminal("P");
    let nested = g.sequence(vec![a, first, b, second, c, last]);
    let leaf = g.literal("b");
    let other = if tail {
        let c2 = g.literal("c");
        let b2 = g.literal("b");
        let pair = g.sequence(vec![c2, b2]);
        let star = g.zero_or_more(pair);
        g.sequence(vec![leaf, star])
    } else {
        leaf
    };
    let body = g.choice(vec![nested, other]);
    g.production("P", body);
    (g, last)
}

#[test]
fn follow_terminates_across_several_references() {
    init_logger();
    let (mut g, last) = interleaved(false);
    let compiled = compile(&mut g, Options::default()).unwrap();
    assert_eq!(compiled.error_count, 0);

    let mut engine = LookaheadEngine::new(&g);
    for limit in 1..=3 {
        let follow = engine.follow_sequences(last, limit);
        assert!(!follow.is_empty());
        assert!(follow.iter().all(|s| !s.is_empty() && s.len() <= limit));
        assert!(follow.iter().all(|s| s[0] == 2 || s[0] == 3));
    }
}

#[test]
fn repetition_check_follows_out_of_the_production() {
    init_logger();
    let (mut g, _) = interleaved(true);
    let options = Options {
        other_ambiguity_check: 3,
        ..Options::default()
    };
    let compiled = compile(&mut g, options).unwrap();
    assert_eq!(compiled.error_count, 0);
    let conflict = compiled
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Repetition)
        .unwrap();
    assert_eq!(conflict.prefix[0], 3);
    assert!(conflict.required_lookahead >= 3);
    assert!(
        compiled
            .diagnostics
            .iter()
            .any(|d| d.message.contains("Choice conflict in (...)* construct"))
    );
}

#[test]
fn minimum_sizes() {
    init_logger();
    let mut g = Grammar::new();
    let a = g.literal("a");
    let b = g.literal("b");
    let ab = g.sequence(vec![a, b]);
    let star = g.zero_or_more(ab);
    let rest = g.nonterminal("pair");
    let top = g.sequence(vec![star, rest]);
    g.production("start", top);
    let a2 = g.literal("a");
    let b2 = g.literal("b");
    let pair = g.sequence(vec![a2, b2]);
    g.production("pair", pair);
    let s = g.literal("s");
    let again = g.nonterminal("forever");
    let endless = g.sequence(vec![s, again]);
    g.production("forever", endless);
    compile(&mut g, Options::default()).unwrap();

    let options = Options::default();
    let mut builder = LookaheadDecisionBuilder::new(&g, &options);
    assert_eq!(builder.minimum_size(star), 0);
    assert_eq!(builder.minimum_size(pair), 2);
    assert_eq!(builder.minimum_size(endless), usize::MAX);
}
