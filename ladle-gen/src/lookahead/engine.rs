use super::matchinfo::MatchInfo;
use crate::grammar::{ExpansionKind, Grammar, NodeId, Parent};
use std::collections::{BTreeSet, HashSet};
use std::mem;
use std::rc::Rc;

pub type Matches = Vec<Rc<MatchInfo>>;

/// Bounded FIRST and FOLLOW computation over a linked grammar.
///
/// Both walks extend a list of partial matches. A match that reaches the
/// limit is moved to the size-limited collection and is not extended any
/// further; the walks return only the matches that are still short.
pub struct LookaheadEngine<'g> {
    grammar: &'g Grammar,
    limit: usize,
    consider_semantic: bool,
    size_limited: Matches,
    generations: Vec<u64>,
    next_generation: u64,
    /// Productions being expanded by FIRST, with the partial matches they
    /// were entered with.
    active: Vec<(usize, Vec<Vec<usize>>)>,
    /// Nodes FOLLOW is currently walking up from, with the tokens of each
    /// match being followed.
    following: HashSet<(NodeId, Vec<usize>)>,
}

impl<'g> LookaheadEngine<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            limit: 1,
            consider_semantic: false,
            size_limited: Vec::new(),
            generations: vec![0; grammar.nodes.len()],
            next_generation: 1,
            active: Vec::new(),
            following: HashSet::new(),
        }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
    }

    /// When set, a semantic lookahead stops FIRST from going any further.
    pub fn set_consider_semantic(&mut self, consider: bool) {
        self.consider_semantic = consider;
    }

    pub fn take_size_limited(&mut self) -> Matches {
        mem::take(&mut self.size_limited)
    }

    /// A list holding one empty match.
    pub fn start(&self) -> Matches {
        vec![Rc::new(MatchInfo::new(self.limit))]
    }

    pub fn first_set(&mut self, partials: &[Rc<MatchInfo>], node: NodeId) -> Matches {
        let g = self.grammar;
        match g.kind(node) {
            ExpansionKind::Token(kind) => {
                let mut out = Vec::with_capacity(partials.len());
                for m in partials {
                    let m = Rc::new(m.extended(*kind));
                    if m.len() >= self.limit {
                        self.size_limited.push(m);
                    } else {
                        out.push(m);
                    }
                }
                out
            }
            ExpansionKind::NonTerminal { production, .. } => {
                let Some(p) = *production else {
                    return Vec::new();
                };
                match g.productions[p].expansion {
                    // A code production can match anything.
                    None => {
                        self.size_limited
                            .extend(partials.iter().map(|m| Rc::new((**m).clone())));
                        Vec::new()
                    }
                    Some(e) => self.first_of_production(partials, p, e),
                }
            }
            ExpansionKind::Choice(alternatives) => {
                let mut out = Vec::new();
                for &a in alternatives {
                    out.extend(self.first_set(partials, a));
                }
                out
            }
            ExpansionKind::Sequence(units) => {
                let mut v = partials.to_vec();
                for &u in units {
                    v = self.first_set(&v, u);
                    if v.is_empty() {
                        break;
                    }
                }
                v
            }
            ExpansionKind::OneOrMore(body) => self.repeat(partials, *body, Vec::new()),
            ExpansionKind::ZeroOrMore(body) => self.repeat(partials, *body, partials.to_vec()),
            ExpansionKind::ZeroOrOne(body) => {
                let mut out = partials.to_vec();
                out.extend(self.first_set(partials, *body));
                out
            }
            ExpansionKind::Lookahead(spec) if self.consider_semantic && spec.semantic.is_some() => {
                Vec::new()
            }
            ExpansionKind::Lookahead(_) | ExpansionKind::Action(_) => partials.to_vec(),
        }
    }

    fn first_of_production(&mut self, partials: &[Rc<MatchInfo>], p: usize, e: NodeId) -> Matches {
        let mut key: Vec<Vec<usize>> = partials.iter().map(|m| m.tokens().to_vec()).collect();
        key.sort_unstable();
        key.dedup();
        // Re-entering with the same matches adds nothing (left recursion).
        if self.active.iter().any(|(q, k)| *q == p && *k == key) {
            return Vec::new();
        }
        self.active.push((p, key));
        let out = self.first_set(partials, e);
        self.active.pop();
        out
    }

    /// Runs `body` over the matches until nothing short is left. Every
    /// pass adds a token, so `limit + 1` passes are enough.
    fn repeat(&mut self, partials: &[Rc<MatchInfo>], body: NodeId, mut out: Matches) -> Matches {
        let mut v = partials.to_vec();
        for _ in 0..=self.limit {
            v = self.first_set(&v, body);
            if v.is_empty() {
                break;
            }
            out.extend(v.iter().cloned());
        }
        out
    }

    fn fresh_generation(&mut self) -> u64 {
        let g = self.next_generation;
        self.next_generation += 1;
        g
    }

    pub fn follow_set(&mut self, partials: &[Rc<MatchInfo>], node: NodeId) -> Matches {
        let generation = self.fresh_generation();
        self.follow(partials, node, generation)
    }

    fn follow(&mut self, partials: &[Rc<MatchInfo>], node: NodeId, generation: u64) -> Matches {
        if self.generations[node] == generation {
            return Vec::new();
        }
        self.generations[node] = generation;
        if self.grammar.node(node).parent == Parent::None {
            return partials.to_vec();
        }

        // A match already being followed from this node yields nothing the
        // outer walk does not, whatever its generation.
        let mut entered = Vec::new();
        let mut fresh = Vec::with_capacity(partials.len());
        for m in partials {
            let key = (node, m.tokens().to_vec());
            if self.following.insert(key.clone()) {
                fresh.push(m.clone());
                entered.push(key);
            }
        }
        if fresh.is_empty() {
            return Vec::new();
        }
        let out = self.follow_parent(&fresh, node, generation);
        for key in &entered {
            self.following.remove(key);
        }
        out
    }

    fn follow_parent(&mut self, partials: &[Rc<MatchInfo>], node: NodeId, generation: u64) -> Matches {
        let g = self.grammar;
        let parent = match g.node(node).parent {
            Parent::None => return partials.to_vec(),
            Parent::Production(p) => {
                let mut out = Vec::new();
                for &r in &g.productions[p].references {
                    out.extend(self.follow(partials, r, generation));
                }
                return out;
            }
            Parent::Node(parent) => parent,
        };
        match g.kind(parent) {
            ExpansionKind::Sequence(units) => {
                let mut v = partials.to_vec();
                for &u in &units[g.node(node).index_in_parent + 1..] {
                    v = self.first_set(&v, u);
                    if v.is_empty() {
                        return v;
                    }
                }
                self.split_follow(partials, v, parent, generation)
            }
            ExpansionKind::OneOrMore(_) | ExpansionKind::ZeroOrMore(_) => {
                let more = self.repeat(partials, node, partials.to_vec());
                self.split_follow(partials, more, parent, generation)
            }
            _ => self.follow(partials, parent, generation),
        }
    }

    /// Matches that came through unchanged keep the current generation;
    /// extended ones start a fresh one.
    fn split_follow(
        &mut self,
        partials: &[Rc<MatchInfo>],
        v: Matches,
        parent: NodeId,
        generation: u64,
    ) -> Matches {
        let (same, extended): (Matches, Matches) = v
            .into_iter()
            .partition(|m| partials.iter().any(|p| Rc::ptr_eq(p, m)));
        let same = if same.is_empty() {
            same
        } else {
            self.follow(&same, parent, generation)
        };
        let mut out = if extended.is_empty() {
            extended
        } else {
            let fresh = self.fresh_generation();
            self.follow(&extended, parent, fresh)
        };
        out.extend(same);
        out
    }

    /// Every token sequence that can start `node`, cut at `limit` tokens.
    pub fn first_sequences(&mut self, node: NodeId, limit: usize) -> BTreeSet<Vec<usize>> {
        self.set_limit(limit);
        self.size_limited.clear();
        let start = self.start();
        let short = self.first_set(&start, node);
        self.collect(short)
    }

    /// Every token sequence that can follow `node`, cut at `limit` tokens.
    pub fn follow_sequences(&mut self, node: NodeId, limit: usize) -> BTreeSet<Vec<usize>> {
        self.set_limit(limit);
        self.size_limited.clear();
        let start = self.start();
        let short = self.follow_set(&start, node);
        self.collect(short)
    }

    fn collect(&mut self, short: Matches) -> BTreeSet<Vec<usize>> {
        let limited = self.take_size_limited();
        short
            .iter()
            .chain(limited.iter())
            .map(|m| m.tokens().to_vec())
            .collect()
    }
}
