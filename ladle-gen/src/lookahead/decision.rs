use crate::context::Options;
use crate::grammar::{ExpansionKind, Grammar, NodeId};
use indexmap::IndexMap;
use smartstring::alias::String;
use std::collections::BTreeSet;

/// How a parser picks one branch at a choice point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Taken without looking at the input.
    Always,
    /// An earlier branch is always taken.
    Unreachable,
    /// Taken when the predicate holds.
    Semantic(String),
    /// Taken when the next token is one of `kinds`.
    Switch(Vec<usize>),
    /// Taken when the named scan routine succeeds (and the predicate, if
    /// any, holds).
    Scan {
        routine: String,
        amount: usize,
        semantic: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Choice,
    OneOrMore,
    ZeroOrMore,
    ZeroOrOne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub expansion: NodeId,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPoint {
    pub node: NodeId,
    pub kind: DecisionKind,
    pub branches: Vec<Branch>,
}

/// A scan routine called directly from a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRoutine {
    pub name: String,
    pub expansion: NodeId,
    pub amount: usize,
}

/// A routine that checks whether `expansion` matches the next `budget`
/// tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoutine {
    pub name: String,
    pub expansion: NodeId,
    pub budget: usize,
    pub minimum_size: usize,
    /// Some choice scanned inline by the routine has a semantic lookahead
    /// that must be evaluated while scanning.
    pub checks_semantic: bool,
}

/// Everything a parser generator needs to emit branch decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookaheadPlan {
    pub decisions: Vec<DecisionPoint>,
    pub entry_routines: Vec<EntryRoutine>,
    pub routines: Vec<ScanRoutine>,
    /// Routine name of each expansion that has one.
    pub names: IndexMap<NodeId, String>,
}

impl LookaheadPlan {
    pub fn decision(&self, node: NodeId) -> Option<&DecisionPoint> {
        self.decisions.iter().find(|d| d.node == node)
    }

    pub fn routine_name(&self, node: NodeId) -> Option<&str> {
        self.names.get(&node).map(|s| s.as_str())
    }

    pub fn routine(&self, name: &str) -> Option<&ScanRoutine> {
        self.routines.iter().find(|r| r.name == name)
    }
}

/// The lookahead guarding one branch.
struct Condition {
    amount: usize,
    semantic: Option<String>,
    expansion: NodeId,
}

pub struct LookaheadDecisionBuilder<'g> {
    grammar: &'g Grammar,
    default_amount: usize,
    entry_count: usize,
    routine_count: usize,
    names: IndexMap<NodeId, String>,
    entries: Vec<EntryRoutine>,
    table: IndexMap<NodeId, usize>,
    worklist: Vec<(NodeId, usize)>,
    in_minimum_size: Vec<bool>,
}

impl<'g> LookaheadDecisionBuilder<'g> {
    pub fn new(grammar: &'g Grammar, options: &Options) -> Self {
        Self {
            grammar,
            default_amount: options.lookahead,
            entry_count: 0,
            routine_count: 0,
            names: IndexMap::new(),
            entries: Vec::new(),
            table: IndexMap::new(),
            worklist: Vec::new(),
            in_minimum_size: vec![false; grammar.nodes.len()],
        }
    }

    pub fn build(mut self) -> LookaheadPlan {
        let g = self.grammar;
        let mut points = Vec::new();
        for p in &g.productions {
            if let Some(root) = p.expansion {
                g.walk(root, false, &mut |id| points.push(id));
            }
        }

        let mut decisions = Vec::new();
        for node in points {
            let (kind, conditions) = match g.kind(node) {
                ExpansionKind::Choice(alternatives) => (
                    DecisionKind::Choice,
                    alternatives.iter().map(|&a| (a, self.condition(a))).collect::<Vec<_>>(),
                ),
                ExpansionKind::OneOrMore(body) => (DecisionKind::OneOrMore, vec![(*body, self.condition(*body))]),
                ExpansionKind::ZeroOrMore(body) => (DecisionKind::ZeroOrMore, vec![(*body, self.condition(*body))]),
                ExpansionKind::ZeroOrOne(body) => (DecisionKind::ZeroOrOne, vec![(*body, self.condition(*body))]),
                _ => continue,
            };
            let branches = self.build_checker(conditions);
            decisions.push(DecisionPoint { node, kind, branches });
        }

        let entries = self.entries.clone();
        for entry in &entries {
            self.enqueue(entry.expansion, entry.amount);
        }
        let mut next = 0;
        while next < self.worklist.len() {
            let (node, budget) = self.worklist[next];
            next += 1;
            self.setup_routines(node, budget);
        }

        let table: Vec<(NodeId, usize)> = self.table.iter().map(|(&n, &b)| (n, b)).collect();
        let mut routines = Vec::with_capacity(table.len());
        for (expansion, budget) in table {
            let checks_semantic = self.checks_semantic(expansion, budget);
            let minimum_size = self.minimum_size(expansion);
            let name = self.names.get(&expansion).cloned().unwrap_or_default();
            routines.push(ScanRoutine {
                name,
                expansion,
                budget,
                minimum_size,
                checks_semantic,
            });
        }

        log::debug!(
            "lookahead plan: {} decision points, {} entry routines, {} scan routines",
            decisions.len(),
            entries.len(),
            routines.len()
        );
        LookaheadPlan {
            decisions,
            entry_routines: entries,
            routines,
            names: self.names,
        }
    }

    /// The lookahead at the front of a branch, or the default one.
    fn condition(&self, branch: NodeId) -> Condition {
        match self.grammar.leading_lookahead(branch) {
            Some((_, spec)) => Condition {
                amount: spec.amount.unwrap_or(self.default_amount),
                semantic: spec.semantic.clone(),
                expansion: spec.expansion.unwrap_or(branch),
            },
            None => Condition {
                amount: self.default_amount,
                semantic: None,
                expansion: branch,
            },
        }
    }

    fn build_checker(&mut self, conditions: Vec<(NodeId, Condition)>) -> Vec<Branch> {
        let g = self.grammar;
        let mut cased: BTreeSet<usize> = BTreeSet::new();
        let mut taken = false;
        let mut branches = Vec::with_capacity(conditions.len());
        for (expansion, cond) in conditions {
            if taken {
                branches.push(Branch {
                    expansion,
                    decision: Decision::Unreachable,
                });
                continue;
            }
            let decision = if cond.amount == 0
                || g.is_nullable(cond.expansion)
                || self.code_production_first(cond.expansion)
            {
                match cond.semantic {
                    None => {
                        taken = true;
                        Decision::Always
                    }
                    Some(predicate) => Decision::Semantic(predicate),
                }
            } else if cond.amount == 1 && cond.semantic.is_none() {
                let (kinds, needs_scan) = self.first_kinds(cond.expansion);
                if needs_scan {
                    self.entry_routine(cond)
                } else {
                    Decision::Switch(kinds.into_iter().filter(|k| cased.insert(*k)).collect())
                }
            } else {
                self.entry_routine(cond)
            };
            branches.push(Branch { expansion, decision });
        }
        branches
    }

    fn entry_routine(&mut self, cond: Condition) -> Decision {
        self.entry_count += 1;
        let name: String = format!("_{}", self.entry_count).into();
        self.names.insert(cond.expansion, name.clone());
        self.entries.push(EntryRoutine {
            name: name.clone(),
            expansion: cond.expansion,
            amount: cond.amount,
        });
        Decision::Scan {
            routine: name,
            amount: cond.amount,
            semantic: cond.semantic,
        }
    }

    /// Whether a code production can be the first thing `node` parses.
    fn code_production_first(&self, node: NodeId) -> bool {
        self.code_check(node, &mut Vec::new())
    }

    fn code_check(&self, node: NodeId, visiting: &mut Vec<usize>) -> bool {
        let g = self.grammar;
        match g.kind(node) {
            ExpansionKind::NonTerminal { production: Some(p), .. } => match g.productions[*p].expansion {
                None => true,
                Some(_) if visiting.contains(p) => false,
                Some(e) => {
                    visiting.push(*p);
                    let found = self.code_check(e, visiting);
                    visiting.pop();
                    found
                }
            },
            ExpansionKind::Choice(alternatives) => alternatives.iter().any(|&a| self.code_check(a, visiting)),
            ExpansionKind::Sequence(units) => {
                for &u in units {
                    // An explicit lookahead announces a parsed sequence.
                    if matches!(g.kind(u), ExpansionKind::Lookahead(la) if la.explicit) {
                        return false;
                    }
                    if self.code_check(u, visiting) {
                        return true;
                    }
                    if !g.is_nullable(u) {
                        return false;
                    }
                }
                false
            }
            ExpansionKind::OneOrMore(b) | ExpansionKind::ZeroOrMore(b) | ExpansionKind::ZeroOrOne(b) => {
                self.code_check(*b, visiting)
            }
            _ => false,
        }
    }

    /// Kinds that can be the next token, and whether a semantic lookahead
    /// on the way makes a scan routine necessary.
    fn first_kinds(&self, node: NodeId) -> (BTreeSet<usize>, bool) {
        let mut kinds = BTreeSet::new();
        let mut needs_scan = false;
        self.collect_first(node, &mut kinds, &mut needs_scan, &mut Vec::new(), &mut Vec::new());
        (kinds, needs_scan)
    }

    fn collect_first(
        &self,
        node: NodeId,
        kinds: &mut BTreeSet<usize>,
        needs_scan: &mut bool,
        productions: &mut Vec<usize>,
        sequences: &mut Vec<NodeId>,
    ) {
        let g = self.grammar;
        match g.kind(node) {
            ExpansionKind::Token(k) => {
                kinds.insert(*k);
            }
            ExpansionKind::NonTerminal { production: Some(p), .. } => {
                if let Some(e) = g.productions[*p].expansion {
                    if !productions.contains(p) {
                        productions.push(*p);
                        self.collect_first(e, kinds, needs_scan, productions, sequences);
                        productions.pop();
                    }
                }
            }
            ExpansionKind::Choice(alternatives) => {
                for &a in alternatives {
                    self.collect_first(a, kinds, needs_scan, productions, sequences);
                }
            }
            ExpansionKind::Sequence(units) => {
                if sequences.contains(&node) {
                    return;
                }
                sequences.push(node);
                if g.leading_lookahead(node).is_some_and(|(_, la)| la.semantic.is_some()) {
                    *needs_scan = true;
                }
                for (i, &u) in units.iter().enumerate() {
                    let code_production = matches!(
                        g.kind(u),
                        ExpansionKind::NonTerminal { production: Some(p), .. } if g.productions[*p].expansion.is_none()
                    );
                    if code_production {
                        // Use what the preceding lookahead scans instead.
                        if let Some(ExpansionKind::Lookahead(la)) = i.checked_sub(1).map(|j| g.kind(units[j])) {
                            if let Some(e) = la.expansion {
                                self.collect_first(e, kinds, needs_scan, productions, sequences);
                            }
                        }
                    } else {
                        self.collect_first(u, kinds, needs_scan, productions, sequences);
                    }
                    if !g.is_nullable(u) {
                        break;
                    }
                }
                sequences.pop();
            }
            ExpansionKind::OneOrMore(b) | ExpansionKind::ZeroOrMore(b) | ExpansionKind::ZeroOrOne(b) => {
                self.collect_first(*b, kinds, needs_scan, productions, sequences);
            }
            _ => {}
        }
    }

    fn enqueue(&mut self, node: NodeId, budget: usize) {
        if self.table.get(&node).is_none_or(|&b| b < budget) {
            self.table.insert(node, budget);
            self.worklist.push((node, budget));
        }
    }

    /// Registers the routines scanning `node` within `budget` tokens needs.
    fn setup_routines(&mut self, node: NodeId, budget: usize) {
        let g = self.grammar;
        match g.kind(node) {
            ExpansionKind::NonTerminal { production: Some(p), .. } => {
                if let Some(e) = g.productions[*p].expansion {
                    self.register(e, budget);
                }
            }
            ExpansionKind::Choice(alternatives) => {
                for &a in alternatives {
                    self.register(a, budget);
                }
            }
            ExpansionKind::Sequence(units) => {
                let mut left = budget;
                for &u in units {
                    if matches!(g.kind(u), ExpansionKind::Lookahead(_)) {
                        continue;
                    }
                    self.setup_routines(u, left);
                    left = left.saturating_sub(self.minimum_size(u));
                    if left == 0 {
                        break;
                    }
                }
            }
            ExpansionKind::OneOrMore(b) | ExpansionKind::ZeroOrMore(b) | ExpansionKind::ZeroOrOne(b) => {
                self.register(*b, budget);
            }
            _ => {}
        }
    }

    /// Names `expansion` and queues its routine. An expansion that boils
    /// down to one token is scanned directly and gets no routine.
    fn register(&mut self, expansion: NodeId, budget: usize) {
        let g = self.grammar;
        if !self.names.contains_key(&expansion) {
            let mut seq = expansion;
            let mut seen = vec![expansion];
            loop {
                let inner = match g.kind(seq) {
                    ExpansionKind::Sequence(units) if units.len() == 2 => units[1],
                    ExpansionKind::NonTerminal { production: Some(p), .. } => match g.productions[*p].expansion {
                        Some(e) => e,
                        None => break,
                    },
                    _ => break,
                };
                if seen.contains(&inner) {
                    break;
                }
                seen.push(inner);
                seq = inner;
            }
            let name: String = match g.kind(seq) {
                ExpansionKind::Token(k) => format!("scan_token({})", k).into(),
                _ => {
                    self.routine_count += 1;
                    format!("R_{}", self.routine_count).into()
                }
            };
            self.names.insert(expansion, name);
        }
        if self.names.get(&expansion).is_some_and(|n| n.starts_with("scan_token")) {
            return;
        }
        self.enqueue(expansion, budget);
    }

    fn checks_semantic(&mut self, node: NodeId, budget: usize) -> bool {
        let g = self.grammar;
        match g.kind(node) {
            ExpansionKind::Choice(alternatives) => alternatives
                .iter()
                .any(|&a| g.leading_lookahead(a).is_some_and(|(_, la)| la.semantic.is_some())),
            ExpansionKind::Sequence(units) => {
                let mut left = budget;
                for &u in units {
                    if matches!(g.kind(u), ExpansionKind::Lookahead(_)) {
                        continue;
                    }
                    if self.checks_semantic(u, left) {
                        return true;
                    }
                    left = left.saturating_sub(self.minimum_size(u));
                    if left == 0 {
                        break;
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Fewest tokens any derivation of `node` consumes. `usize::MAX` stands
    /// for unbounded, including a code production and a path that is
    /// already being measured.
    pub fn minimum_size(&mut self, node: NodeId) -> usize {
        self.min_size(node, usize::MAX)
    }

    fn min_size(&mut self, node: NodeId, old_min: usize) -> usize {
        if self.in_minimum_size[node] {
            return usize::MAX;
        }
        self.in_minimum_size[node] = true;
        let g = self.grammar;
        let size = match g.kind(node) {
            ExpansionKind::Token(_) => 1,
            ExpansionKind::NonTerminal { production, .. } => {
                match production.and_then(|p| g.productions[p].expansion) {
                    Some(e) => self.min_size(e, usize::MAX),
                    None => usize::MAX,
                }
            }
            ExpansionKind::Choice(alternatives) => {
                let mut min = old_min;
                for &a in alternatives {
                    if min == 0 {
                        break;
                    }
                    min = min.min(self.min_size(a, min));
                }
                min
            }
            ExpansionKind::Sequence(units) => {
                let mut min = 0usize;
                for &u in units {
                    let m = self.min_size(u, usize::MAX);
                    if min == usize::MAX || m == usize::MAX {
                        min = usize::MAX;
                    } else {
                        min = min.saturating_add(m);
                        if min > old_min {
                            break;
                        }
                    }
                }
                min
            }
            ExpansionKind::OneOrMore(b) => self.min_size(*b, usize::MAX),
            ExpansionKind::ZeroOrMore(_)
            | ExpansionKind::ZeroOrOne(_)
            | ExpansionKind::Lookahead(_)
            | ExpansionKind::Action(_) => 0,
        };
        self.in_minimum_size[node] = false;
        size
    }
}
