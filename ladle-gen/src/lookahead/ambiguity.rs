use super::engine::{LookaheadEngine, Matches};
use super::matchinfo::MatchInfo;
use crate::context::CompilationContext;
use crate::grammar::{ExpansionKind, Grammar, NodeId};

/// What a conflict is between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two alternatives of a choice; `other` is the later one.
    Choice { other: NodeId },
    /// The body of `(...)*`, `(...)+` or `[...]` and what follows it.
    Repetition,
}

/// An ambiguity found at a choice point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The earlier alternative, or the repetition construct.
    pub node: NodeId,
    pub kind: ConflictKind,
    /// One token sequence both sides can start with.
    pub prefix: Vec<usize>,
    /// Lookahead that would tell the sides apart.
    pub required_lookahead: usize,
    /// `false` if no lookahead up to the configured bound was enough.
    pub within_bound: bool,
}

/// Looks for choice points whose branches cannot be told apart with the
/// lookahead they get.
pub struct AmbiguityChecker<'g, 'c> {
    grammar: &'g Grammar,
    ctx: &'c mut CompilationContext,
    engine: LookaheadEngine<'g>,
}

/// `(...)*`, `(...)+` or `[...]`.
pub fn construct_image(kind: &ExpansionKind) -> &'static str {
    match kind {
        ExpansionKind::OneOrMore(_) => "(...)+",
        ExpansionKind::ZeroOrMore(_) => "(...)*",
        ExpansionKind::ZeroOrOne(_) => "[...]",
        _ => "",
    }
}

impl<'g, 'c> AmbiguityChecker<'g, 'c> {
    pub fn new(grammar: &'g Grammar, ctx: &'c mut CompilationContext) -> Self {
        Self {
            grammar,
            ctx,
            engine: LookaheadEngine::new(grammar),
        }
    }

    /// Checks every choice point reachable from a production.
    pub fn check_all(&mut self) -> Vec<Conflict> {
        let g = self.grammar;
        let lookahead = self.ctx.options.lookahead;
        let force = self.ctx.options.force_la_check;
        let mut nodes = Vec::new();
        for p in &g.productions {
            if let Some(root) = p.expansion {
                g.walk(root, false, &mut |id| nodes.push(id));
            }
        }

        let mut conflicts = Vec::new();
        for id in nodes {
            match g.kind(id) {
                ExpansionKind::Choice(_) if lookahead == 1 || force => {
                    conflicts.extend(self.check_choice(id));
                }
                ExpansionKind::OneOrMore(body)
                | ExpansionKind::ZeroOrMore(body)
                | ExpansionKind::ZeroOrOne(body) => {
                    if force || (self.implicit_lookahead(*body) && lookahead == 1) {
                        conflicts.extend(self.check_repetition(id, *body));
                    }
                }
                _ => {}
            }
        }
        log::debug!("ambiguity check: {} conflicts", conflicts.len());
        conflicts
    }

    fn explicit_lookahead(&self, alternative: NodeId) -> bool {
        self.grammar
            .leading_lookahead(alternative)
            .is_some_and(|(_, la)| la.explicit)
    }

    fn implicit_lookahead(&self, body: NodeId) -> bool {
        !self.explicit_lookahead(body)
    }

    /// Index of the first alternative that needs checking.
    fn first_choice(&self, alternatives: &[NodeId]) -> usize {
        if self.ctx.options.force_la_check {
            return 0;
        }
        alternatives
            .iter()
            .position(|&a| !self.explicit_lookahead(a))
            .unwrap_or(alternatives.len())
    }

    fn first_of(&mut self, node: NodeId, consider_semantic: bool) -> Matches {
        self.engine.set_consider_semantic(consider_semantic);
        self.engine.take_size_limited();
        let start = self.engine.start();
        self.engine.first_set(&start, node);
        self.engine.take_size_limited()
    }

    pub fn check_choice(&mut self, choice: NodeId) -> Vec<Conflict> {
        let g = self.grammar;
        let ExpansionKind::Choice(alternatives) = g.kind(choice) else {
            return Vec::new();
        };
        let n = alternatives.len();
        if n < 2 {
            return Vec::new();
        }
        let first = self.first_choice(alternatives);
        let bound = self.ctx.options.choice_ambiguity_check;
        let force = self.ctx.options.force_la_check;

        let mut dbl: Vec<Matches> = vec![Vec::new(); n];
        let mut dbr: Vec<Matches> = vec![Vec::new(); n];
        let mut min_la = vec![0usize; n - 1];
        let mut overlap_info: Vec<Option<MatchInfo>> = vec![None; n - 1];
        let mut other = vec![0usize; n - 1];

        for la in 1..=bound {
            log::trace!("choice at {}: checking lookahead {}", g.node(choice).position, la);
            self.engine.set_limit(la);
            for i in first..n - 1 {
                dbl[i] = self.first_of(alternatives[i], !force);
            }
            for i in first + 1..n {
                dbr[i] = self.first_of(alternatives[i], false);
            }
            if la == 1 {
                for i in first..n - 1 {
                    let alt = alternatives[i];
                    if g.is_nullable(alt) {
                        self.ctx.warning(
                            g.node(alt).position,
                            "This choice can expand to the empty token sequence and will therefore always be taken in favor of the choices after it.",
                        );
                        return Vec::new();
                    }
                    if dbl[i].iter().any(|m| m.is_empty()) {
                        self.ctx.warning(
                            g.node(alt).position,
                            "JAVACODE non-terminal will force this choice to be taken in favor of the choices after it.",
                        );
                        return Vec::new();
                    }
                }
            }
            let mut overlap_detected = false;
            for i in first..n - 1 {
                for j in i + 1..n {
                    if let Some(m) = overlap(&dbl[i], &dbr[j]) {
                        min_la[i] = la + 1;
                        overlap_info[i] = Some(m);
                        other[i] = j;
                        overlap_detected = true;
                        break;
                    }
                }
            }
            if !overlap_detected {
                break;
            }
        }

        let mut conflicts = Vec::new();
        for i in first..n - 1 {
            if self.explicit_lookahead(alternatives[i]) && !force {
                continue;
            }
            if min_la[i] <= 1 {
                continue;
            }
            let prefix = overlap_info[i].take().map(|m| m.tokens().to_vec()).unwrap_or_default();
            let here = g.node(alternatives[i]).position;
            let there = g.node(alternatives[other[i]]).position;
            let within_bound = min_la[i] <= bound;
            let advice = if within_bound {
                format!("Consider using a lookahead of {} for earlier expansion.", min_la[i])
            } else {
                format!("Consider using a lookahead of {} or more for earlier expansion.", min_la[i])
            };
            self.ctx.warning(
                here,
                format!(
                    "Choice conflict involving two expansions at {} and {}.\n         A common prefix is: {}\n         {}",
                    here,
                    there,
                    image(g, &prefix),
                    advice
                ),
            );
            conflicts.push(Conflict {
                node: alternatives[i],
                kind: ConflictKind::Choice {
                    other: alternatives[other[i]],
                },
                prefix,
                required_lookahead: min_la[i],
                within_bound,
            });
        }
        conflicts
    }

    /// Checks whether entering `body` again can be confused with leaving
    /// the construct `node`.
    pub fn check_repetition(&mut self, node: NodeId, body: NodeId) -> Option<Conflict> {
        let g = self.grammar;
        let bound = self.ctx.options.other_ambiguity_check;
        let force = self.ctx.options.force_la_check;
        let construct = construct_image(g.kind(node));
        let mut last: Option<MatchInfo> = None;

        let mut la = 1;
        while la <= bound {
            self.engine.set_limit(la);
            let first = self.first_of(body, !force);
            self.engine.set_consider_semantic(false);
            let start = self.engine.start();
            self.engine.follow_set(&start, node);
            let follow = self.engine.take_size_limited();

            if la == 1 && first.iter().any(|m| m.is_empty()) {
                self.ctx.warning(
                    g.node(body).position,
                    format!(
                        "JAVACODE non-terminal within {} construct will force this construct to be entered in favor of expansions occurring after construct.",
                        construct
                    ),
                );
            }
            match overlap(&first, &follow) {
                Some(m) => last = Some(m),
                None => break,
            }
            la += 1;
        }
        if la <= 1 {
            return None;
        }

        let prefix = last.map(|m| m.tokens().to_vec()).unwrap_or_default();
        let within_bound = la <= bound;
        let advice = if within_bound {
            format!("Consider using a lookahead of {} for nested expansion.", la)
        } else {
            format!("Consider using a lookahead of {} or more for nested expansion.", la)
        };
        let position = g.node(node).position;
        self.ctx.warning(
            position,
            format!(
                "Choice conflict in {} construct at {}.\n         Expansion nested within construct and expansion following construct\n         have common prefixes, one of which is: {}\n         {}",
                construct,
                position,
                image(g, &prefix),
                advice
            ),
        );
        Some(Conflict {
            node,
            kind: ConflictKind::Repetition,
            prefix,
            required_lookahead: la,
            within_bound,
        })
    }
}

/// Finds a pair of matches agreeing on their common prefix. Returns the
/// shorter one. Hitting an empty match ends the search without a result.
fn overlap(left: &Matches, right: &Matches) -> Option<MatchInfo> {
    for m1 in left {
        for m2 in right {
            if m1.is_empty() || m2.is_empty() {
                return None;
            }
            if let Some(m) = m1.common_prefix(m2) {
                return Some(m.clone());
            }
        }
    }
    None
}

/// Space-separated token images of a match.
pub fn image(grammar: &Grammar, tokens: &[usize]) -> String {
    tokens
        .iter()
        .map(|&t| grammar.token_image(t))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Options;
    use crate::grammar::LookaheadSpec;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn check(g: &mut Grammar, options: Options) -> (Vec<Conflict>, CompilationContext) {
        let mut ctx = CompilationContext::new(options);
        g.link(&mut ctx);
        assert_eq!(ctx.diagnostics.error_count(), 0);
        let conflicts = AmbiguityChecker::new(g, &mut ctx).check_all();
        (conflicts, ctx)
    }

    /// `A ::= "x" B | <second> C`, `B ::= "b"`, `C ::= "c"`
    fn two_way(g: &mut Grammar, second: &str, lookahead: Option<LookaheadSpec>) -> NodeId {
        let x = g.literal("x");
        let b = g.nonterminal("B");
        let first = match lookahead {
            Some(spec) => g.sequence_with(spec, vec![x, b]),
            None => g.sequence(vec![x, b]),
        };
        let y = g.literal(second);
        let c = g.nonterminal("C");
        let alt = g.sequence(vec![y, c]);
        let choice = g.choice(vec![first, alt]);
        g.production("A", choice);
        let tb = g.literal("b");
        g.production("B", tb);
        let tc = g.literal("c");
        g.production("C", tc);
        choice
    }

    #[test]
    fn common_prefix_conflict() {
        init_logger();
        let mut g = Grammar::new();
        let choice = two_way(&mut g, "x", None);
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.prefix, vec![1]);
        assert_eq!(c.required_lookahead, 2);
        assert!(c.within_bound);
        let ExpansionKind::Choice(alts) = g.kind(choice) else { panic!() };
        assert_eq!(c.node, alts[0]);
        assert_eq!(c.kind, ConflictKind::Choice { other: alts[1] });
        assert!(ctx.diagnostics.mentions("A common prefix is: \"x\""));
        assert!(ctx.diagnostics.mentions("Consider using a lookahead of 2 for earlier expansion."));
    }

    #[test]
    fn distinct_prefixes_do_not_conflict() {
        init_logger();
        let mut g = Grammar::new();
        two_way(&mut g, "y", None);
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert!(conflicts.is_empty());
        assert_eq!(ctx.diagnostics.warning_count(), 0);
    }

    #[test]
    fn explicit_lookahead_suppresses_warning() {
        init_logger();
        let mut g = Grammar::new();
        two_way(&mut g, "x", Some(LookaheadSpec::tokens(2)));
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert!(conflicts.is_empty());
        assert_eq!(ctx.diagnostics.warning_count(), 0);

        let mut g = Grammar::new();
        two_way(&mut g, "x", Some(LookaheadSpec::tokens(2)));
        let forced = Options {
            force_la_check: true,
            ..Options::default()
        };
        let (conflicts, _) = check(&mut g, forced);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn unresolved_conflict_asks_for_more() {
        init_logger();
        let mut g = Grammar::new();
        let a1 = g.literal("a");
        let a2 = g.literal("a");
        let a3 = g.literal("a");
        let b = g.literal("b");
        let first = g.sequence(vec![a1, a2, a3]);
        let second = g.sequence(vec![b]);
        let a4 = g.literal("a");
        let a5 = g.literal("a");
        let a6 = g.literal("a");
        let b2 = g.literal("b");
        let third = g.sequence(vec![a4, a5, a6, b2]);
        let choice = g.choice(vec![first, second, third]);
        g.production("start", choice);
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].required_lookahead, 3);
        assert!(!conflicts[0].within_bound);
        assert_eq!(conflicts[0].prefix, vec![1, 1]);
        assert!(ctx.diagnostics.mentions("Consider using a lookahead of 3 or more for earlier expansion."));
    }

    #[test]
    fn nullable_alternative_warns() {
        init_logger();
        let mut g = Grammar::new();
        let a = g.literal("a");
        let opt = g.zero_or_one(a);
        let first = g.sequence(vec![opt]);
        let b = g.literal("b");
        let choice = g.choice(vec![first, b]);
        g.production("start", choice);
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert!(conflicts.is_empty());
        assert!(ctx.diagnostics.mentions("can expand to the empty token sequence"));
    }

    #[test]
    fn repetition_against_follow() {
        init_logger();
        let mut g = Grammar::new();
        let a = g.literal("a");
        let b = g.literal("b");
        let body = g.sequence(vec![a, b]);
        let star = g.zero_or_more(body);
        let a2 = g.literal("a");
        let c = g.literal("c");
        let top = g.sequence(vec![star, a2, c]);
        g.production("start", top);
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].node, star);
        assert_eq!(conflicts[0].kind, ConflictKind::Repetition);
        assert_eq!(conflicts[0].prefix, vec![1]);
        assert_eq!(conflicts[0].required_lookahead, 2);
        assert!(!conflicts[0].within_bound);
        assert!(ctx.diagnostics.mentions("Choice conflict in (...)* construct"));
    }

    #[test]
    fn code_production_in_repetition_warns() {
        init_logger();
        let mut g = Grammar::new();
        let n = g.nonterminal("opaque");
        let body = g.sequence(vec![n]);
        let star = g.zero_or_more(body);
        let end = g.literal(";");
        let top = g.sequence(vec![star, end]);
        g.production("start", top);
        g.code_production("opaque");
        let (_, ctx) = check(&mut g, Options::default());
        assert!(ctx.diagnostics.mentions("JAVACODE non-terminal within (...)* construct"));
    }

    #[test]
    fn code_production_in_choice_warns() {
        init_logger();
        let mut g = Grammar::new();
        let opaque = g.nonterminal("opaque");
        let x = g.literal("x");
        let guarded = g.sequence(vec![opaque, x]);
        let y = g.literal("y");
        let choice = g.choice(vec![guarded, y]);
        g.production("start", choice);
        g.code_production("opaque");
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert!(conflicts.is_empty());
        assert_eq!(ctx.diagnostics.warning_count(), 1);
        assert!(ctx.diagnostics.mentions("JAVACODE non-terminal will force this choice"));
    }

    #[test]
    fn code_production_in_last_choice_is_silent() {
        init_logger();
        let mut g = Grammar::new();
        let y = g.literal("y");
        let opaque = g.nonterminal("opaque");
        let x = g.literal("x");
        let guarded = g.sequence(vec![opaque, x]);
        let choice = g.choice(vec![y, guarded]);
        g.production("start", choice);
        g.code_production("opaque");
        let (conflicts, ctx) = check(&mut g, Options::default());
        assert!(!ctx.diagnostics.mentions("JAVACODE"));
        assert!(conflicts.is_empty());
    }
}
