use crate::error::{Position, ScanError, Span};
use smartstring::alias::String;
use std::mem;

/// The token kind reported at end of input.
pub const EOF_KIND: usize = 0;

/// What the scanner does with the text a token kind matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TokenAction {
    /// Return the match as a token.
    #[default]
    Token,
    /// Discard the match.
    Skip,
    /// Keep the match as a prefix of the next one.
    More,
    /// Attach the match to the next returned token.
    Special,
}

impl TokenAction {
    #[inline]
    pub fn to_str(self) -> &'static str {
        match self {
            TokenAction::Token => "TOKEN",
            TokenAction::Skip => "SKIP",
            TokenAction::More => "MORE",
            TokenAction::Special => "SPECIAL_TOKEN",
        }
    }
}

/// Per-kind scanner behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindInfo {
    pub label: String,
    pub action: TokenAction,
    /// Lexical mode to switch to after a match of this kind.
    pub next_mode: Option<usize>,
}

/// One runtime automaton state.
///
/// A state consumes a character if any of its move tables contains it. The
/// consumption completes a match of `kind` (if set) and activates the states
/// listed in `next_sets[next_set]` of the owning mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScanState {
    /// Bitset of ASCII characters, `c >> 6` selects the word.
    pub ascii_moves: [u64; 2],
    /// Sorted non-ASCII characters.
    pub char_moves: Vec<char>,
    /// Sorted, inclusive non-ASCII ranges.
    pub range_moves: Vec<(char, char)>,
    pub kind: Option<usize>,
    pub next_set: Option<usize>,
}

impl ScanState {
    pub fn can_move(&self, c: char) -> bool {
        let code = c as u32;
        if code < 128 {
            self.ascii_moves[(code >> 6) as usize] & (1u64 << (code & 63)) != 0
        } else {
            self.char_moves.binary_search(&c).is_ok()
                || self.range_moves.iter().any(|&(lo, hi)| lo <= c && c <= hi)
        }
    }
}

/// The automaton of one lexical mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanMode {
    pub name: String,
    pub states: Vec<ScanState>,
    /// Shared successor arrays, addressed by [`ScanState::next_set`].
    pub next_sets: Vec<Vec<usize>>,
    /// Composite states. Composite `k` has id `states.len() + k`.
    pub composites: Vec<Vec<usize>>,
    /// State or composite id active when a match starts.
    pub initial: Option<usize>,
    /// Kind matched by the empty string in this mode.
    pub empty_match: Option<usize>,
    /// Mode to enter once end of input has been reported.
    pub eof_next_mode: Option<usize>,
}

impl ScanMode {
    /// Appends the plain states represented by `id` to `out`.
    pub fn seed(&self, id: usize, out: &mut Vec<usize>) {
        if id < self.states.len() {
            out.push(id);
        } else if let Some(members) = self.composites.get(id - self.states.len()) {
            out.extend_from_slice(members);
        }
    }
}

/// Everything the scanner needs to tokenize input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanTables {
    pub modes: Vec<ScanMode>,
    pub kinds: Vec<KindInfo>,
    pub start_mode: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: usize,
    pub image: String,
    pub span: Span,
    /// `SPECIAL_TOKEN` matches seen since the previous token.
    pub specials: Vec<Token>,
}

#[derive(Debug, Clone, Default)]
pub struct LexerStats {
    pub chars: usize,
    pub matches: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Copy)]
struct Match {
    kind: usize,
    len: usize,
}

/// Table-driven scanner over a string slice.
///
/// Each call to [`Lexer::try_next`] runs the automaton of the current mode
/// from the current offset and keeps the longest match. Among matches of the
/// same length the lowest kind wins.
pub struct Lexer<'a> {
    tables: &'a ScanTables,
    input: &'a str,
    offset: usize,
    pos: Position,
    pub mode: usize,

    buffer: String,
    buffer_start: Option<Position>,
    specials: Vec<Token>,

    end_flag: bool,
    active: Vec<usize>,
    next: Vec<usize>,

    stats: LexerStats,
}

impl<'a> Lexer<'a> {
    pub fn new(tables: &'a ScanTables, input: &'a str) -> Self {
        Self {
            tables,
            input,
            offset: 0,
            pos: Position::start(),
            mode: tables.start_mode,
            buffer: String::new(),
            buffer_start: None,
            specials: Vec::new(),
            end_flag: false,
            active: Vec::new(),
            next: Vec::new(),
            stats: LexerStats::default(),
        }
    }

    pub fn stats(&self) -> LexerStats {
        self.stats.clone()
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// Scans up to and including the end-of-input token.
    pub fn tokenize_all(mut self) -> Result<Vec<Token>, ScanError> {
        let mut out = Vec::new();
        while let Some(t) = self.try_next()? {
            out.push(t);
        }
        Ok(out)
    }

    pub fn try_next(&mut self) -> Result<Option<Token>, ScanError> {
        loop {
            if self.end_flag {
                return Ok(None);
            }

            if self.offset == self.input.len() {
                if let Some(start) = self.buffer_start {
                    return Err(ScanError::UnterminatedMore(start));
                }
                self.end_flag = true;
                let mode = self.current_mode()?;
                if let Some(m) = mode.eof_next_mode {
                    self.mode = m;
                }
                self.stats.tokens += 1;
                log::trace!("EOF: mode={}, pos={}", self.mode, self.pos);
                return Ok(Some(Token {
                    kind: EOF_KIND,
                    image: String::new(),
                    span: Span::new(self.pos, self.pos),
                    specials: mem::take(&mut self.specials),
                }));
            }

            let start = self.pos;
            let m = match self.try_match()? {
                Some(m) => m,
                None => {
                    let found = self.input[self.offset..].chars().next().unwrap_or('\0');
                    return Err(ScanError::NoMatch {
                        mode: self.mode,
                        found,
                        pos: start,
                    });
                }
            };

            let tables = self.tables;
            let info = tables
                .kinds
                .get(m.kind)
                .ok_or(ScanError::UnknownKind(m.kind))?;
            if m.len == 0 && info.next_mode.is_none_or(|n| n == self.mode) {
                return Err(ScanError::EmptyMatch {
                    kind: m.kind,
                    pos: start,
                });
            }

            let text = &self.input[self.offset..self.offset + m.len];
            for c in text.chars() {
                self.pos.advance(c);
            }
            self.offset += m.len;
            self.stats.matches += 1;
            self.buffer.push_str(text);
            let token_start = self.buffer_start.take().unwrap_or(start);

            log::trace!(
                "MATCHED: mode={}, kind={} ({}), action={}, text={:?}",
                self.mode,
                m.kind,
                info.label,
                info.action.to_str(),
                text
            );

            if let Some(n) = info.next_mode {
                self.mode = n;
            }

            match info.action {
                TokenAction::More => {
                    self.buffer_start = Some(token_start);
                }
                TokenAction::Skip => {
                    self.buffer.clear();
                }
                TokenAction::Special => {
                    let token = Token {
                        kind: m.kind,
                        image: mem::take(&mut self.buffer),
                        span: Span::new(token_start, self.pos),
                        specials: Vec::new(),
                    };
                    self.specials.push(token);
                }
                TokenAction::Token => {
                    self.stats.tokens += 1;
                    return Ok(Some(Token {
                        kind: m.kind,
                        image: mem::take(&mut self.buffer),
                        span: Span::new(token_start, self.pos),
                        specials: mem::take(&mut self.specials),
                    }));
                }
            }
        }
    }

    fn current_mode(&self) -> Result<&'a ScanMode, ScanError> {
        let tables = self.tables;
        tables
            .modes
            .get(self.mode)
            .ok_or(ScanError::UnknownMode(self.mode))
    }

    fn try_match(&mut self) -> Result<Option<Match>, ScanError> {
        let mode = self.current_mode()?;
        let mut last_match = mode.empty_match.map(|kind| Match { kind, len: 0 });

        self.active.clear();
        if let Some(init) = mode.initial {
            mode.seed(init, &mut self.active);
        }
        let mut marks = vec![usize::MAX; mode.states.len()];

        for (i, c) in self.input[self.offset..].char_indices() {
            if self.active.is_empty() {
                break;
            }
            self.stats.chars += 1;
            self.next.clear();
            let mut kind: Option<usize> = None;
            for &s in &self.active {
                let state = &mode.states[s];
                if !state.can_move(c) {
                    continue;
                }
                if let Some(k) = state.kind {
                    kind = Some(kind.map_or(k, |prev| prev.min(k)));
                }
                if let Some(ns) = state.next_set {
                    for &t in &mode.next_sets[ns] {
                        if marks[t] != i {
                            marks[t] = i;
                            self.next.push(t);
                        }
                    }
                }
            }
            if let Some(k) = kind {
                log::trace!("MATCH: i={}, c={:?}, kind={}", i, c, k);
                last_match = Some(Match {
                    kind: k,
                    len: i + c.len_utf8(),
                });
            }
            mem::swap(&mut self.active, &mut self.next);
        }

        Ok(last_match)
    }
}
