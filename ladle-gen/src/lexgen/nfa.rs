use crate::error::GenError;
use std::collections::BTreeSet;

/// One NFA state of a lexical state's automaton.
///
/// A state with character moves consumes one matching character and
/// continues at `next`. Epsilon moves are kept ordered and deduplicated;
/// after closure they list every useful state active together with this one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutomatonState {
    pub id: usize,
    pub ascii_moves: [u64; 2],
    /// Sorted non-ASCII characters.
    pub char_moves: Vec<char>,
    /// Sorted non-ASCII inclusive ranges.
    pub range_moves: Vec<(char, char)>,
    pub next: Option<usize>,
    pub epsilon_moves: BTreeSet<usize>,
    pub is_final: bool,
    /// Lowest token kind accepted in this state's epsilon closure.
    pub kind: Option<usize>,
    /// Kind completed by a move out of this state.
    pub kind_to_print: Option<usize>,
    pub runtime_index: Option<usize>,
}

impl AutomatonState {
    #[inline]
    pub fn has_transitions(&self) -> bool {
        self.ascii_moves != [0, 0] || !self.char_moves.is_empty() || !self.range_moves.is_empty()
    }

    /// States that matter at scan time: they consume input or accept.
    #[inline]
    pub fn is_useful(&self) -> bool {
        self.is_final || self.has_transitions()
    }

    pub fn add_char(&mut self, c: char) {
        let code = c as u32;
        if code < 128 {
            self.ascii_moves[(code >> 6) as usize] |= 1u64 << (code & 63);
        } else if let Err(pos) = self.char_moves.binary_search(&c) {
            self.char_moves.insert(pos, c);
        }
    }

    pub fn add_range(&mut self, lo: char, hi: char) {
        if lo > hi {
            return;
        }
        let mut lo = lo;
        while (lo as u32) < 128 && lo <= hi {
            self.add_char(lo);
            match char::from_u32(lo as u32 + 1) {
                Some(c) => lo = c,
                None => return,
            }
        }
        if lo > hi {
            return;
        }
        if lo == hi {
            self.add_char(lo);
        } else if let Err(pos) = self.range_moves.binary_search(&(lo, hi)) {
            self.range_moves.insert(pos, (lo, hi));
        }
    }

    #[inline]
    pub fn same_moves(&self, other: &AutomatonState) -> bool {
        self.ascii_moves == other.ascii_moves
            && self.char_moves == other.char_moves
            && self.range_moves == other.range_moves
    }

    /// Lowers `kind` to `k` if `k` is lower.
    #[inline]
    pub fn lower_kind(&mut self, k: Option<usize>) -> bool {
        match (self.kind, k) {
            (_, None) => false,
            (Some(cur), Some(k)) if cur <= k => false,
            (_, Some(k)) => {
                self.kind = Some(k);
                true
            }
        }
    }

    /// A copy of the moves, finality and kind, without epsilon moves.
    pub fn clone_moves(&self, id: usize) -> AutomatonState {
        AutomatonState {
            id,
            ascii_moves: self.ascii_moves,
            char_moves: self.char_moves.clone(),
            range_moves: self.range_moves.clone(),
            next: self.next,
            epsilon_moves: BTreeSet::new(),
            is_final: self.is_final,
            kind: self.kind,
            kind_to_print: None,
            runtime_index: None,
        }
    }
}

/// Start and end of a compiled fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: usize,
    pub end: usize,
}

/// Arena of automaton states of one lexical state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nfa {
    pub states: Vec<AutomatonState>,
}

impl Nfa {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn new_state(&mut self) -> usize {
        let id = self.states.len();
        self.states.push(AutomatonState {
            id,
            ..Default::default()
        });
        id
    }

    pub fn new_fragment(&mut self) -> Fragment {
        let start = self.new_state();
        let end = self.new_state();
        Fragment { start, end }
    }

    #[inline]
    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        self.states[from].epsilon_moves.insert(to);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Unions the moves, finality and kind of `src` into `dst`.
    pub fn merge_moves(&mut self, dst: usize, src: usize) -> Result<(), GenError> {
        if dst == src {
            return Err(GenError::Internal(
                "attempt to merge the move table of a state with itself".into(),
            ));
        }
        let other = self.states[src].clone();
        let state = &mut self.states[dst];
        state.ascii_moves[0] |= other.ascii_moves[0];
        state.ascii_moves[1] |= other.ascii_moves[1];
        for c in other.char_moves {
            state.add_char(c);
        }
        for (lo, hi) in other.range_moves {
            state.add_range(lo, hi);
        }
        state.lower_kind(other.kind);
        state.is_final |= other.is_final;
        Ok(())
    }
}
