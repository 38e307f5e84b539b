use super::nfa::{Fragment, Nfa};
use crate::context::CompilationContext;
use crate::regex::{CharDescriptor, CharacterList, Regex, case_variants};
use ladle::Position;

/// Builds Thompson-style NFA fragments for token regular expressions.
///
/// `regexes` is the grammar's regex arena; `JustName` references are
/// compiled by temporarily taking the referenced slot out of it. Finding a
/// slot already taken means the reference is circular.
pub struct RegexCompiler<'a> {
    pub nfa: &'a mut Nfa,
    pub regexes: &'a mut [Option<Regex>],
    pub ctx: &'a mut CompilationContext,
    pub ignore_case: bool,
    /// Position of the token definition being compiled, for diagnostics.
    pub position: Position,
}

impl RegexCompiler<'_> {
    pub fn compile(&mut self, regex: &mut Regex) -> Fragment {
        match regex {
            Regex::CharacterList(list) => self.compile_char_list(list),
            Regex::Choice(choices) => self.compile_choice(choices),
            Regex::Sequence(units) => self.compile_sequence(units),
            Regex::OneOrMore(body) => {
                let f = self.nfa.new_fragment();
                let inner = self.compile(body);
                self.nfa.add_epsilon(f.start, inner.start);
                self.nfa.add_epsilon(inner.end, inner.start);
                self.nfa.add_epsilon(inner.end, f.end);
                f
            }
            Regex::ZeroOrMore(body) => {
                let f = self.nfa.new_fragment();
                let inner = self.compile(body);
                self.nfa.add_epsilon(f.start, inner.start);
                self.nfa.add_epsilon(f.start, f.end);
                self.nfa.add_epsilon(inner.end, f.end);
                self.nfa.add_epsilon(inner.end, inner.start);
                f
            }
            Regex::ZeroOrOne(body) => {
                let f = self.nfa.new_fragment();
                let inner = self.compile(body);
                self.nfa.add_epsilon(f.start, inner.start);
                self.nfa.add_epsilon(f.start, f.end);
                self.nfa.add_epsilon(inner.end, f.end);
                f
            }
            Regex::StringLiteral(image) => {
                let image = image.clone();
                self.compile_literal(&image)
            }
            Regex::RepetitionRange { body, min, max } => {
                let mut units: Vec<Regex> = (0..*min).map(|_| (**body).clone()).collect();
                match max {
                    None => units.push(Regex::ZeroOrMore(body.clone())),
                    Some(max) => {
                        for _ in *min..*max {
                            units.push(Regex::ZeroOrOne(body.clone()));
                        }
                    }
                }
                self.compile_sequence(&mut units)
            }
            Regex::JustName { label, target } => {
                let Some(id) = *target else {
                    // Already reported while linking.
                    return self.empty_match();
                };
                match self.regexes.get_mut(id).and_then(Option::take) {
                    Some(mut named) => {
                        let f = self.compile(&mut named);
                        self.regexes[id] = Some(named);
                        f
                    }
                    None => {
                        self.ctx.semantic_error(
                            self.position,
                            format!("Loop in regular expression detected: \"<{}>\"", label),
                        );
                        self.empty_match()
                    }
                }
            }
            Regex::EndOfFile => {
                self.ctx.semantic_error(
                    self.position,
                    "<EOF> cannot be used inside a regular expression",
                );
                self.empty_match()
            }
        }
    }

    fn empty_match(&mut self) -> Fragment {
        let f = self.nfa.new_fragment();
        self.nfa.add_epsilon(f.start, f.end);
        f
    }

    fn compile_char_list(&mut self, list: &mut CharacterList) -> Fragment {
        list.normalize(self.ignore_case);
        if list.is_empty() {
            self.ctx.semantic_error(
                self.position,
                "Empty character set is not allowed as it will not match any character.",
            );
            // Keeps the automaton well formed; `compile` rejects the grammar.
            return self.empty_match();
        }
        let f = self.nfa.new_fragment();
        let start = &mut self.nfa.states[f.start];
        for d in &list.descriptors {
            match *d {
                CharDescriptor::Single(c) => start.add_char(c),
                CharDescriptor::Range(lo, hi) => start.add_range(lo, hi),
            }
        }
        start.next = Some(f.end);
        f
    }

    fn compile_choice(&mut self, choices: &mut Vec<Regex>) -> Fragment {
        compress_char_lists(choices, self.ignore_case);
        if choices.is_empty() {
            self.ctx.semantic_error(self.position, "Empty choice will not match anything.");
            return self.empty_match();
        }
        if choices.len() == 1 {
            return self.compile(&mut choices[0]);
        }
        let f = self.nfa.new_fragment();
        for choice in choices.iter_mut() {
            let inner = self.compile(choice);
            self.nfa.add_epsilon(f.start, inner.start);
            self.nfa.add_epsilon(inner.end, f.end);
        }
        f
    }

    fn compile_sequence(&mut self, units: &mut [Regex]) -> Fragment {
        match units {
            [] => self.empty_match(),
            [only] => self.compile(only),
            _ => {
                let f = self.nfa.new_fragment();
                let mut prev = f.start;
                for unit in units.iter_mut() {
                    let inner = self.compile(unit);
                    self.nfa.add_epsilon(prev, inner.start);
                    prev = inner.end;
                }
                self.nfa.add_epsilon(prev, f.end);
                f
            }
        }
    }

    fn compile_literal(&mut self, image: &str) -> Fragment {
        let mut chars = image.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                let mut list = CharacterList::new(vec![CharDescriptor::Single(c)], false);
                self.compile_char_list(&mut list)
            }
            _ => self.compile_long_literal(image),
        }
    }

    fn compile_long_literal(&mut self, image: &str) -> Fragment {
        if image.is_empty() {
            return self.empty_match();
        }
        let f = self.nfa.new_fragment();
        let n = image.chars().count();
        let mut state = f.start;
        for (i, c) in image.chars().enumerate() {
            let next = if i + 1 == n { f.end } else { self.nfa.new_state() };
            let s = &mut self.nfa.states[state];
            s.add_char(c);
            if self.ignore_case {
                for v in case_variants(c) {
                    s.add_char(v);
                }
            }
            s.next = Some(next);
            state = next;
        }
        f
    }
}

/// Flattens nested choices and merges every character-list alternative
/// (including one-character literals) into the first of them.
fn compress_char_lists(choices: &mut Vec<Regex>, ignore_case: bool) {
    let mut flat = Vec::with_capacity(choices.len());
    let mut stack: Vec<Regex> = choices.drain(..).rev().collect();
    while let Some(r) = stack.pop() {
        match r {
            Regex::Choice(inner) => stack.extend(inner.into_iter().rev()),
            other => flat.push(other),
        }
    }

    let mut merged: Option<(usize, CharacterList)> = None;
    for r in flat {
        let list = match r {
            Regex::CharacterList(mut list) => {
                list.normalize(ignore_case);
                list
            }
            Regex::StringLiteral(ref s) if s.chars().count() == 1 => {
                let mut list = CharacterList::new(
                    s.chars().map(CharDescriptor::Single).collect(),
                    false,
                );
                list.normalize(ignore_case);
                list
            }
            other => {
                choices.push(other);
                continue;
            }
        };
        match &mut merged {
            Some((_, acc)) => acc.descriptors.extend(list.descriptors),
            None => {
                merged = Some((choices.len(), list));
                choices.push(Regex::Choice(Vec::new()));
            }
        }
    }
    if let Some((at, mut acc)) = merged {
        acc.sort_descriptors();
        acc.transformed = true;
        choices[at] = Regex::CharacterList(acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::CharDescriptor::{Range, Single};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn compile(regex: &mut Regex, ignore_case: bool) -> (Nfa, Fragment, CompilationContext) {
        let mut nfa = Nfa::new();
        let mut ctx = CompilationContext::default();
        let mut regexes: Vec<Option<Regex>> = Vec::new();
        let f = RegexCompiler {
            nfa: &mut nfa,
            regexes: &mut regexes,
            ctx: &mut ctx,
            ignore_case,
            position: Position::start(),
        }
        .compile(regex);
        (nfa, f, ctx)
    }

    #[test]
    fn char_list_moves_on_start() {
        init_logger();
        let mut r = Regex::chars(&[Range('0', '9'), Single('_')]);
        let (nfa, f, ctx) = compile(&mut r, false);
        assert_eq!(nfa.len(), 2);
        assert_eq!(nfa.states[f.start].next, Some(f.end));
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }

    #[test]
    fn empty_char_list_is_semantic_error() {
        init_logger();
        let mut r = Regex::chars(&[]);
        let (nfa, f, ctx) = compile(&mut r, false);
        assert_eq!(ctx.diagnostics.error_count(), 1);
        assert!(nfa.states[f.start].epsilon_moves.contains(&f.end));
        assert!(!nfa.states[f.start].has_transitions());
    }

    #[test]
    fn long_literal_is_a_chain() {
        init_logger();
        let mut r = Regex::literal("for");
        let (nfa, f, _) = compile(&mut r, true);
        assert_eq!(nfa.len(), 4);
        let first = &nfa.states[f.start];
        assert_ne!(first.ascii_moves[1] & (1 << ('f' as u64 - 64)), 0);
        assert_ne!(first.ascii_moves[1] & (1 << ('F' as u64 - 64)), 0);
        let mut s = f.start;
        for _ in 0..3 {
            s = nfa.states[s].next.unwrap();
        }
        assert_eq!(s, f.end);
    }

    #[test]
    fn choice_of_chars_compresses_to_one_list() {
        init_logger();
        let mut r = Regex::Choice(vec![
            Regex::literal("a"),
            Regex::literal("bc"),
            Regex::Choice(vec![Regex::chars(&[Single('b')]), Regex::literal("d")]),
        ]);
        let (_, _, ctx) = compile(&mut r, false);
        assert_eq!(ctx.diagnostics.error_count(), 0);
        let Regex::Choice(v) = &r else { panic!() };
        assert_eq!(v.len(), 2);
        assert!(
            matches!(&v[0], Regex::CharacterList(l) if l.descriptors == vec![Range('a', 'b'), Single('d')])
        );
    }

    #[test]
    fn repetition_range_desugars() {
        init_logger();
        let mut bounded = Regex::literal("ab").repeat(2, Some(3));
        let (nfa, _, _) = compile(&mut bounded, false);
        // 2 + 1 copies of a 3-state chain, one optional wrapper, the sequence.
        assert_eq!(nfa.len(), 3 * 3 + 2 + 2);

        let mut open = Regex::literal("x").repeat(1, None);
        let (nfa, f, _) = compile(&mut open, false);
        assert!(nfa.states.iter().any(|s| s.epsilon_moves.contains(&f.end)));
    }

    #[test]
    fn circular_name_is_reported() {
        init_logger();
        let mut nfa = Nfa::new();
        let mut ctx = CompilationContext::default();
        let mut regexes = vec![None];
        let mut r = Regex::JustName {
            label: "SELF".into(),
            target: Some(0),
        };
        RegexCompiler {
            nfa: &mut nfa,
            regexes: &mut regexes,
            ctx: &mut ctx,
            ignore_case: false,
            position: Position::start(),
        }
        .compile(&mut r);
        assert!(ctx.diagnostics.mentions("Loop in regular expression"));
    }
}
