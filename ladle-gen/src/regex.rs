//! Token regular expressions.
//!
//! A [`Regex`] is the input to the lexer automaton builder. Character lists
//! are normalized in place (case folding, sorting, negation removal) the
//! first time they are compiled; the `transformed` flag keeps a list that is
//! reachable from several tokens from being processed twice.

use smartstring::alias::String;

const MAX_CHAR: u32 = 0x10FFFF;
const SURROGATE_LO: u32 = 0xD800;
const SURROGATE_HI: u32 = 0xDFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CharDescriptor {
    Single(char),
    /// Inclusive range.
    Range(char, char),
}

impl CharDescriptor {
    #[inline]
    pub fn bounds(self) -> (char, char) {
        match self {
            CharDescriptor::Single(c) => (c, c),
            CharDescriptor::Range(lo, hi) => (lo, hi),
        }
    }

    fn from_bounds(lo: u32, hi: u32) -> Option<Self> {
        let lo = char::from_u32(lo)?;
        let hi = char::from_u32(hi)?;
        Some(if lo == hi {
            CharDescriptor::Single(lo)
        } else {
            CharDescriptor::Range(lo, hi)
        })
    }
}

/// `[...]` or `~[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterList {
    pub descriptors: Vec<CharDescriptor>,
    pub negated: bool,
    pub transformed: bool,
}

/// The other-case forms of `c` that are single characters.
pub(crate) fn case_variants(c: char) -> impl Iterator<Item = char> {
    let mut lower = c.to_lowercase();
    let lower = match (lower.next(), lower.next()) {
        (Some(l), None) if l != c => Some(l),
        _ => None,
    };
    let mut upper = c.to_uppercase();
    let upper = match (upper.next(), upper.next()) {
        (Some(u), None) if u != c => Some(u),
        _ => None,
    };
    lower.into_iter().chain(upper)
}

impl CharacterList {
    pub fn new(descriptors: Vec<CharDescriptor>, negated: bool) -> Self {
        Self {
            descriptors,
            negated,
            transformed: false,
        }
    }

    /// Sorted, merged `(lo, hi)` code point intervals.
    fn intervals(&self) -> Vec<(u32, u32)> {
        let mut v: Vec<(u32, u32)> = self
            .descriptors
            .iter()
            .map(|d| {
                let (lo, hi) = d.bounds();
                (lo as u32, hi as u32)
            })
            .filter(|(lo, hi)| lo <= hi)
            .collect();
        v.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(v.len());
        for (lo, hi) in v {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        merged
    }

    fn set_intervals(&mut self, intervals: &[(u32, u32)]) {
        self.descriptors = intervals
            .iter()
            .filter_map(|&(lo, hi)| CharDescriptor::from_bounds(lo, hi))
            .collect();
    }

    /// Adds the other-case form of every listed character.
    pub fn to_case_neutral(&mut self) {
        let mut extra = Vec::new();
        for d in &self.descriptors {
            match *d {
                CharDescriptor::Single(c) => {
                    extra.extend(case_variants(c).map(CharDescriptor::Single));
                }
                CharDescriptor::Range(lo, hi) => {
                    for c in lo..=hi {
                        extra.extend(
                            case_variants(c)
                                .filter(|v| *v < lo || *v > hi)
                                .map(CharDescriptor::Single),
                        );
                    }
                }
            }
        }
        self.descriptors.extend(extra);
    }

    /// Sorts descriptors and merges overlapping or adjacent ones.
    pub fn sort_descriptors(&mut self) {
        let intervals = self.intervals();
        self.set_intervals(&intervals);
    }

    /// Replaces a negated list by the list of every other character.
    pub fn remove_negation(&mut self) {
        if !self.negated {
            return;
        }
        let mut out = Vec::new();
        let mut push_gap = |a: u32, b: u32| {
            if a <= b.min(SURROGATE_LO - 1) {
                out.push((a, b.min(SURROGATE_LO - 1)));
            }
            if b >= SURROGATE_HI + 1 && a.max(SURROGATE_HI + 1) <= b {
                out.push((a.max(SURROGATE_HI + 1), b));
            }
        };
        let mut next = 0u32;
        for (lo, hi) in self.intervals() {
            if lo > next {
                push_gap(next, lo - 1);
            }
            next = hi + 1;
        }
        if next <= MAX_CHAR {
            push_gap(next, MAX_CHAR);
        }
        self.set_intervals(&out);
        self.negated = false;
    }

    /// Folds case (if asked), removes negation and sorts, once.
    pub fn normalize(&mut self, ignore_case: bool) {
        if self.transformed {
            return;
        }
        if ignore_case {
            self.to_case_neutral();
        }
        if self.negated {
            self.remove_negation();
        } else {
            self.sort_descriptors();
        }
        self.transformed = true;
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    CharacterList(CharacterList),
    Choice(Vec<Regex>),
    Sequence(Vec<Regex>),
    OneOrMore(Box<Regex>),
    ZeroOrMore(Box<Regex>),
    ZeroOrOne(Box<Regex>),
    StringLiteral(String),
    /// `body{min}`, `body{min,}` or `body{min,max}`.
    RepetitionRange {
        body: Box<Regex>,
        min: usize,
        max: Option<usize>,
    },
    /// Reference to another labeled expression; `target` is filled in by
    /// [`Grammar::link`](crate::Grammar::link).
    JustName {
        label: String,
        target: Option<usize>,
    },
    EndOfFile,
}

impl Regex {
    pub fn literal(image: &str) -> Self {
        Regex::StringLiteral(image.into())
    }

    pub fn chars(descriptors: &[CharDescriptor]) -> Self {
        Regex::CharacterList(CharacterList::new(descriptors.to_vec(), false))
    }

    pub fn not_chars(descriptors: &[CharDescriptor]) -> Self {
        Regex::CharacterList(CharacterList::new(descriptors.to_vec(), true))
    }

    pub fn range(lo: char, hi: char) -> Self {
        Regex::chars(&[CharDescriptor::Range(lo, hi)])
    }

    pub fn name(label: &str) -> Self {
        Regex::JustName {
            label: label.into(),
            target: None,
        }
    }

    pub fn one_or_more(self) -> Self {
        Regex::OneOrMore(Box::new(self))
    }

    pub fn zero_or_more(self) -> Self {
        Regex::ZeroOrMore(Box::new(self))
    }

    pub fn zero_or_one(self) -> Self {
        Regex::ZeroOrOne(Box::new(self))
    }

    pub fn repeat(self, min: usize, max: Option<usize>) -> Self {
        Regex::RepetitionRange {
            body: Box::new(self),
            min,
            max,
        }
    }

    /// Calls `f` on every `JustName` node, depth first.
    pub fn for_each_name_mut(&mut self, f: &mut impl FnMut(&str, &mut Option<usize>)) {
        match self {
            Regex::JustName { label, target } => f(label, target),
            Regex::Choice(v) | Regex::Sequence(v) => {
                for r in v {
                    r.for_each_name_mut(f);
                }
            }
            Regex::OneOrMore(r) | Regex::ZeroOrMore(r) | Regex::ZeroOrOne(r) => {
                r.for_each_name_mut(f)
            }
            Regex::RepetitionRange { body, .. } => body.for_each_name_mut(f),
            Regex::CharacterList(_) | Regex::StringLiteral(_) | Regex::EndOfFile => {}
        }
    }
}
