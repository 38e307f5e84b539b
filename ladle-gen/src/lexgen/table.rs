use super::closure::compute_closures;
use super::compile::RegexCompiler;
use super::nfa::Nfa;
use crate::context::CompilationContext;
use crate::error::GenError;
use crate::grammar::Grammar;
use indexmap::{IndexMap, IndexSet};
use ladle::{KindInfo, ScanMode, ScanState, ScanTables, TokenAction};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet};

/// A numbered runtime state and the automaton state it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeState {
    pub nfa_state: usize,
    /// Kind matched by consuming a character in this state.
    pub kind: Option<usize>,
    pub next_set: Option<usize>,
}

/// Move tables plus what follows a move. States with equal signatures
/// behave identically and share one runtime number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Signature {
    kind: Option<usize>,
    ascii: [u64; 2],
    chars: Vec<char>,
    ranges: Vec<(char, char)>,
    next: Option<Vec<usize>>,
}

/// The compiled automaton of one lexical state.
#[derive(Debug, Clone)]
pub struct LexicalStateTable {
    pub name: String,
    pub nfa: Nfa,
    pub initial_state: usize,
    pub runtime: Vec<RuntimeState>,
    pub next_sets: IndexSet<Vec<usize>>,
    pub composites: IndexSet<Vec<usize>>,
    /// Runtime state or composite id a match starts from.
    pub initial: Option<usize>,
    pub empty_match: Option<usize>,
    pub has_eof_rule: bool,
    pub eof_next_state: Option<usize>,
    /// Runtime states a token's automaton starts in, by token ordinal.
    pub kind_start_states: BTreeMap<usize, Vec<usize>>,
    pub has_token: bool,
    pub has_skip: bool,
    pub has_more: bool,
    pub has_special: bool,
}

impl LexicalStateTable {
    /// Composite ids follow the plain state ids.
    #[inline]
    pub fn composite_id(&self, k: usize) -> usize {
        self.runtime.len() + k
    }

    pub fn to_scan_mode(&self) -> ScanMode {
        let states = self
            .runtime
            .iter()
            .map(|r| {
                let s = &self.nfa.states[r.nfa_state];
                ScanState {
                    ascii_moves: s.ascii_moves,
                    char_moves: s.char_moves.clone(),
                    range_moves: s.range_moves.clone(),
                    kind: r.kind,
                    next_set: r.next_set,
                }
            })
            .collect();
        ScanMode {
            name: self.name.clone(),
            states,
            next_sets: self.next_sets.iter().cloned().collect(),
            composites: self.composites.iter().cloned().collect(),
            initial: self.initial,
            empty_match: self.empty_match,
            eof_next_mode: self.eof_next_state,
        }
    }
}

/// Scanner tables for every lexical state of a grammar.
#[derive(Debug, Clone)]
pub struct LexerTables {
    pub states: Vec<LexicalStateTable>,
    pub kinds: Vec<KindInfo>,
}

impl LexerTables {
    pub fn state(&self, name: &str) -> Option<&LexicalStateTable> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn to_scan_tables(&self) -> ScanTables {
        ScanTables {
            modes: self.states.iter().map(LexicalStateTable::to_scan_mode).collect(),
            kinds: self.kinds.clone(),
            start_mode: 0,
        }
    }
}

/// Builds the automata of all lexical states.
pub fn build_lexer(grammar: &mut Grammar, ctx: &mut CompilationContext) -> Result<LexerTables, GenError> {
    let mut states = Vec::with_capacity(grammar.lexical_states.len());
    for mode in 0..grammar.lexical_states.len() {
        states.push(build_lexical_state(grammar, mode, ctx)?);
    }
    let kinds = grammar
        .tokens
        .iter()
        .enumerate()
        .map(|(ordinal, def)| KindInfo {
            label: def.label.clone().unwrap_or_else(|| grammar.token_image(ordinal)),
            action: def.action,
            next_mode: def.next_state,
        })
        .collect();
    Ok(LexerTables { states, kinds })
}

fn build_lexical_state(
    grammar: &mut Grammar,
    mode: usize,
    ctx: &mut CompilationContext,
) -> Result<LexicalStateTable, GenError> {
    let name: String = grammar.lexical_states.sym(mode).unwrap_or_default().into();
    let mut nfa = Nfa::new();
    let initial_state = nfa.new_state();
    let mut table = LexicalStateTable {
        name,
        nfa: Nfa::new(),
        initial_state,
        runtime: Vec::new(),
        next_sets: IndexSet::new(),
        composites: IndexSet::new(),
        initial: None,
        empty_match: None,
        has_eof_rule: false,
        eof_next_state: None,
        kind_start_states: BTreeMap::new(),
        has_token: false,
        has_skip: false,
        has_more: false,
        has_special: false,
    };

    let mut starts: Vec<(usize, usize)> = Vec::new();
    for ordinal in 1..grammar.tokens.len() {
        let def = &grammar.tokens[ordinal];
        if !def.active_in(mode) {
            continue;
        }
        let (slot, position, action) = (def.regex, def.position, def.action);
        let ignore_case = def.ignore_case || ctx.options.ignore_case;
        let Some(mut regex) = grammar.regexes.get_mut(slot).and_then(Option::take) else {
            return Err(GenError::Internal(
                format!("regular expression of token {} is missing", ordinal).into(),
            ));
        };
        let fragment = RegexCompiler {
            nfa: &mut nfa,
            regexes: &mut grammar.regexes,
            ctx: &mut *ctx,
            ignore_case,
            position,
        }
        .compile(&mut regex);
        grammar.regexes[slot] = Some(regex);

        let end = &mut nfa.states[fragment.end];
        end.is_final = true;
        end.lower_kind(Some(ordinal));
        nfa.add_epsilon(initial_state, fragment.start);
        starts.push((ordinal, fragment.start));

        match action {
            TokenAction::Token => table.has_token = true,
            TokenAction::Skip => table.has_skip = true,
            TokenAction::More => table.has_more = true,
            TokenAction::Special => table.has_special = true,
        }
    }
    for rule in grammar.eof_rules.iter().filter(|r| r.active_in(mode)) {
        table.has_eof_rule = true;
        table.eof_next_state = rule.next_state;
    }

    compute_closures(&mut nfa, ctx.options.reduce_states)?;

    table.empty_match = nfa.states[initial_state].kind;
    if let Some(k) = table.empty_match {
        let def = &grammar.tokens[k];
        let label = match &def.label {
            Some(l) => format!(" for {}", l),
            None => std::string::String::new(),
        };
        ctx.warning(
            def.position,
            format!(
                "Regular expression{} can be matched by the empty string (\"\") in lexical state {}. This can result in an endless loop of empty string matches.",
                label, table.name
            ),
        );
    }

    number_states(&mut nfa, initial_state, &starts, &mut table);
    table.nfa = nfa;
    log::debug!(
        "lexical state {}: {} automaton states, {} runtime states, {} next sets, {} composites",
        table.name,
        table.nfa.len(),
        table.runtime.len(),
        table.next_sets.len(),
        table.composites.len()
    );
    Ok(table)
}

/// Numbers the states with transitions reachable from the initial state,
/// then interns the successor sets and composites.
fn number_states(nfa: &mut Nfa, initial: usize, starts: &[(usize, usize)], table: &mut LexicalStateTable) {
    let mut signatures: IndexMap<Signature, usize> = IndexMap::new();
    let mut visited = vec![false; nfa.len()];
    let mut seeds: Vec<usize> = nfa.states[initial].epsilon_moves.iter().copied().collect();
    for &(_, start) in starts {
        seeds.extend(nfa.states[start].epsilon_moves.iter().copied());
    }

    for seed in seeds {
        let mut stack = vec![seed];
        while let Some(s) = stack.pop() {
            if visited[s] || !nfa.states[s].has_transitions() {
                continue;
            }
            visited[s] = true;
            let state = &nfa.states[s];
            let next_eps: Option<Vec<usize>> = state
                .next
                .map(|n| nfa.states[n].epsilon_moves.iter().copied().collect());
            let signature = Signature {
                kind: state.next.and_then(|n| nfa.states[n].kind),
                ascii: state.ascii_moves,
                chars: state.char_moves.clone(),
                ranges: state.range_moves.clone(),
                next: next_eps.clone(),
            };
            let kind = signature.kind;
            let index = match signatures.get(&signature) {
                Some(&i) => i,
                None => {
                    let i = table.runtime.len();
                    table.runtime.push(RuntimeState {
                        nfa_state: s,
                        kind,
                        next_set: None,
                    });
                    signatures.insert(signature, i);
                    i
                }
            };
            let state = &mut nfa.states[s];
            state.kind_to_print = kind;
            state.runtime_index = Some(index);
            if let Some(next) = next_eps {
                stack.extend(next.into_iter().rev());
            }
        }
    }

    let nfa = &*nfa;
    for r in 0..table.runtime.len() {
        let Some(next) = nfa.states[table.runtime[r].nfa_state].next else {
            continue;
        };
        let set = runtime_set(nfa, &nfa.states[next].epsilon_moves);
        if set.is_empty() {
            continue;
        }
        if set.len() > 1 {
            table.composites.insert(set.clone());
        }
        table.runtime[r].next_set = Some(table.next_sets.insert_full(set).0);
    }

    for &(ordinal, start) in starts {
        let set = runtime_set(nfa, &nfa.states[start].epsilon_moves);
        table.kind_start_states.insert(ordinal, set);
    }

    let initial_set = runtime_set(nfa, &nfa.states[initial].epsilon_moves);
    table.initial = match initial_set.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            let k = table.composites.insert_full(initial_set).0;
            Some(table.composite_id(k))
        }
    };
}

/// Sorted runtime numbers of the numbered states among `ids`.
fn runtime_set(nfa: &Nfa, ids: &BTreeSet<usize>) -> Vec<usize> {
    let mut v: Vec<usize> = ids.iter().filter_map(|&t| nfa.states[t].runtime_index).collect();
    v.sort_unstable();
    v.dedup();
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenSpec;
    use crate::regex::Regex;
    use ladle::Lexer;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn keyword_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_token(TokenSpec::labeled("FOR", Regex::literal("for")));
        g.add_token(TokenSpec::labeled("ID", Regex::range('a', 'z').one_or_more()));
        g.add_token(
            TokenSpec::new(Regex::chars(&[
                crate::regex::CharDescriptor::Single(' '),
                crate::regex::CharDescriptor::Single('\n'),
            ]))
            .action(TokenAction::Skip),
        );
        g
    }

    fn build(g: &mut Grammar, options: crate::Options) -> (LexerTables, CompilationContext) {
        let mut ctx = CompilationContext::new(options);
        g.link(&mut ctx);
        let tables = build_lexer(g, &mut ctx).unwrap();
        (tables, ctx)
    }

    fn kinds(tables: &ScanTables, input: &str) -> Vec<usize> {
        Lexer::new(tables, input)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn longest_match_beats_keyword() {
        init_logger();
        for reduce in [true, false] {
            let mut g = keyword_grammar();
            let options = crate::Options {
                reduce_states: reduce,
                ..Default::default()
            };
            let (tables, ctx) = build(&mut g, options);
            assert_eq!(ctx.diagnostics.error_count(), 0);
            let scan = tables.to_scan_tables();
            assert_eq!(kinds(&scan, "format for x"), vec![2, 1, 2, 0]);
        }
    }

    #[test]
    fn tables_are_deterministic() {
        init_logger();
        let mut a = keyword_grammar();
        let mut b = keyword_grammar();
        let (ta, _) = build(&mut a, Default::default());
        let (tb, _) = build(&mut b, Default::default());
        assert_eq!(ta.to_scan_tables(), tb.to_scan_tables());
    }

    #[test]
    fn start_states_and_flags() {
        init_logger();
        let mut g = keyword_grammar();
        let (tables, _) = build(&mut g, Default::default());
        let default = tables.state("DEFAULT").unwrap();
        assert!(default.has_token && default.has_skip);
        assert!(!default.has_more && !default.has_special);
        assert_eq!(default.kind_start_states.len(), 3);
        assert!(default.initial.is_some());
        assert_eq!(default.empty_match, None);
        let ids: Vec<usize> = default.kind_start_states.values().flatten().copied().collect();
        assert!(ids.iter().all(|&i| i < default.runtime.len()));
    }

    #[test]
    fn comment_mode_with_more() {
        init_logger();
        let mut g = Grammar::new();
        g.add_token(
            TokenSpec::new(Regex::literal("/*"))
                .action(TokenAction::More)
                .next_state("IN_COMMENT"),
        );
        g.add_token(
            TokenSpec::labeled("COMMENT", Regex::literal("*/"))
                .in_states(&["IN_COMMENT"])
                .action(TokenAction::Special)
                .next_state("DEFAULT"),
        );
        g.add_token(
            TokenSpec::new(Regex::not_chars(&[]))
                .in_states(&["IN_COMMENT"])
                .action(TokenAction::More),
        );
        g.add_token(TokenSpec::labeled("X", Regex::literal("x")));
        let (tables, ctx) = build(&mut g, Default::default());
        assert_eq!(ctx.diagnostics.error_count(), 0);
        let scan = tables.to_scan_tables();
        let tokens = Lexer::new(&scan, "/* a */x").tokenize_all().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, 4);
        assert_eq!(tokens[0].specials[0].image, "/* a */");
        let comment = tables.state("IN_COMMENT").unwrap();
        assert!(comment.has_more && comment.has_special);
    }

    #[test]
    fn empty_match_is_reported() {
        init_logger();
        let mut g = Grammar::new();
        g.add_token(TokenSpec::labeled("OPT", Regex::literal("a").zero_or_more()));
        let (tables, ctx) = build(&mut g, Default::default());
        assert_eq!(tables.states[0].empty_match, Some(1));
        assert!(ctx.diagnostics.mentions("can be matched by the empty string"));
        assert!(ctx.diagnostics.mentions("for OPT"));
    }

    #[test]
    fn eof_rule_sets_next_state() {
        init_logger();
        let mut g = keyword_grammar();
        g.add_token(TokenSpec::new(Regex::EndOfFile).next_state("AFTER"));
        let (tables, _) = build(&mut g, Default::default());
        let default = tables.state("DEFAULT").unwrap();
        assert!(default.has_eof_rule);
        assert_eq!(default.eof_next_state, Some(1));
        assert_eq!(tables.states.len(), 2);
        assert_eq!(tables.states[1].initial, None);
    }
}
