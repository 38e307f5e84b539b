//! The grammar model: token definitions, productions and the expansion tree.
//!
//! Expansion nodes live in an arena owned by [`Grammar`] and are addressed by
//! [`NodeId`]. Parent links are plain ids used to walk upward when
//! computing FOLLOW sets; ownership always flows downward from the arena.
//!
//! Grammars are assembled with the builder methods and then resolved by
//! [`Grammar::link`]:
//!
//! ```rust
//! # use ladle_gen::{CompilationContext, Grammar, Regex, TokenSpec};
//! let mut g = Grammar::new();
//! g.add_token(TokenSpec::labeled("ID", Regex::range('a', 'z').one_or_more()));
//! let open = g.literal("(");
//! let inner = g.nonterminal("list");
//! let close = g.literal(")");
//! let nested = g.sequence(vec![open, inner, close]);
//! let id = g.token("ID");
//! let item = g.choice(vec![nested, id]);
//! let body = g.zero_or_more(item);
//! g.production("list", body);
//!
//! let mut ctx = CompilationContext::default();
//! g.link(&mut ctx);
//! assert_eq!(ctx.diagnostics.error_count(), 0);
//! ```

use crate::context::CompilationContext;
use crate::regex::Regex;
use crate::symtab::Symtab;
use indexmap::IndexMap;
use ladle::{Position, TokenAction};
use smartstring::alias::String;

pub type NodeId = usize;

/// Name of the lexical state tokens belong to unless told otherwise.
pub const DEFAULT_STATE: &str = "DEFAULT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    None,
    Production(usize),
    Node(NodeId),
}

/// A `LOOKAHEAD(...)` specification at the front of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookaheadSpec {
    /// Number of tokens; `None` uses [`Options::lookahead`](crate::Options).
    pub amount: Option<usize>,
    pub explicit: bool,
    /// Semantic predicate, kept as source text.
    pub semantic: Option<String>,
    /// Expansion scanned by a syntactic lookahead. After linking, `None`
    /// has been replaced by the enclosing sequence.
    pub expansion: Option<NodeId>,
}

impl LookaheadSpec {
    pub fn implicit() -> Self {
        Self::default()
    }

    /// `LOOKAHEAD(n)`
    pub fn tokens(n: usize) -> Self {
        Self {
            amount: Some(n),
            explicit: true,
            ..Self::default()
        }
    }

    /// `LOOKAHEAD(expansion)`: scan as far as the expansion requires.
    pub fn syntactic(expansion: NodeId) -> Self {
        Self {
            amount: Some(usize::MAX),
            explicit: true,
            expansion: Some(expansion),
            ..Self::default()
        }
    }

    /// `LOOKAHEAD({ predicate })`
    pub fn semantic(predicate: &str) -> Self {
        Self {
            amount: Some(0),
            explicit: true,
            semantic: Some(predicate.into()),
            ..Self::default()
        }
    }

    pub fn with_semantic(mut self, predicate: &str) -> Self {
        self.semantic = Some(predicate.into());
        self
    }

    pub fn with_expansion(mut self, expansion: NodeId) -> Self {
        self.expansion = Some(expansion);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionKind {
    /// A token reference by ordinal; ordinal 0 is `<EOF>`.
    Token(usize),
    NonTerminal {
        name: String,
        production: Option<usize>,
    },
    Choice(Vec<NodeId>),
    Sequence(Vec<NodeId>),
    OneOrMore(NodeId),
    ZeroOrMore(NodeId),
    ZeroOrOne(NodeId),
    Lookahead(LookaheadSpec),
    /// Embedded action code.
    Action(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub kind: ExpansionKind,
    pub parent: Parent,
    /// Position among the parent's children.
    pub index_in_parent: usize,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub name: String,
    /// `None` for a code production, whose parse function is hand written.
    pub expansion: Option<NodeId>,
    pub position: Position,
    /// Non-terminal nodes that refer to this production.
    pub references: Vec<NodeId>,
    pub nullable: bool,
}

/// A token definition as registered in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub label: Option<String>,
    /// Slot in [`Grammar::regexes`].
    pub regex: usize,
    pub action: TokenAction,
    pub lexical_states: Vec<usize>,
    pub all_states: bool,
    pub next_state: Option<usize>,
    pub ignore_case: bool,
    /// Image of a plain string literal token.
    pub literal: Option<String>,
    pub position: Position,
}

impl TokenDef {
    #[inline]
    pub fn active_in(&self, state: usize) -> bool {
        self.all_states || self.lexical_states.contains(&state)
    }
}

/// What happens at end of input in some lexical states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EofRule {
    pub lexical_states: Vec<usize>,
    pub all_states: bool,
    pub next_state: Option<usize>,
    pub position: Position,
}

impl EofRule {
    #[inline]
    pub fn active_in(&self, state: usize) -> bool {
        self.all_states || self.lexical_states.contains(&state)
    }
}

/// Builder input for [`Grammar::add_token`].
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub label: Option<String>,
    pub regex: Regex,
    pub action: TokenAction,
    /// Empty means the default lexical state.
    pub states: Vec<String>,
    pub all_states: bool,
    pub next_state: Option<String>,
    pub ignore_case: bool,
}

impl TokenSpec {
    pub fn new(regex: Regex) -> Self {
        Self {
            label: None,
            regex,
            action: TokenAction::Token,
            states: Vec::new(),
            all_states: false,
            next_state: None,
            ignore_case: false,
        }
    }

    pub fn labeled(label: &str, regex: Regex) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(regex)
        }
    }

    pub fn action(mut self, action: TokenAction) -> Self {
        self.action = action;
        self
    }

    pub fn in_states(mut self, states: &[&str]) -> Self {
        self.states = states.iter().map(|s| (*s).into()).collect();
        self
    }

    /// `<*>`
    pub fn in_all_states(mut self) -> Self {
        self.all_states = true;
        self
    }

    pub fn next_state(mut self, state: &str) -> Self {
        self.next_state = Some(state.into());
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub nodes: Vec<Expansion>,
    pub productions: Vec<Production>,
    pub production_names: Symtab,
    pub tokens: Vec<TokenDef>,
    pub regexes: Vec<Option<Regex>>,
    /// Labeled regular expressions (tokens and private ones) by label.
    pub regex_names: IndexMap<String, usize>,
    pub lexical_states: Symtab,
    pub eof_rules: Vec<EofRule>,
    token_refs: Vec<(NodeId, String)>,
    deferred_errors: Vec<(Position, String)>,
    position: Position,
    linked: bool,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let mut lexical_states = Symtab::new();
        lexical_states.add(DEFAULT_STATE);
        let mut g = Self {
            nodes: Vec::new(),
            productions: Vec::new(),
            production_names: Symtab::new(),
            tokens: Vec::new(),
            regexes: Vec::new(),
            regex_names: IndexMap::new(),
            lexical_states,
            eof_rules: Vec::new(),
            token_refs: Vec::new(),
            deferred_errors: Vec::new(),
            position: Position::start(),
            linked: false,
        };
        g.regexes.push(Some(Regex::EndOfFile));
        g.tokens.push(TokenDef {
            label: Some("EOF".into()),
            regex: 0,
            action: TokenAction::Token,
            lexical_states: Vec::new(),
            all_states: false,
            next_state: None,
            ignore_case: false,
            literal: None,
            position: Position::start(),
        });
        g
    }

    /// Sets the source position recorded on everything built next.
    pub fn at(&mut self, line: usize, column: usize) -> &mut Self {
        self.position = Position::new(line, column);
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn lexical_state(&mut self, name: &str) -> usize {
        self.lexical_states.add(name)
    }

    fn resolve_states(&mut self, names: &[String]) -> Vec<usize> {
        if names.is_empty() {
            return vec![0];
        }
        names.iter().map(|s| self.lexical_states.add(s)).collect()
    }

    /// Registers a token and returns its ordinal. An `<EOF>` definition
    /// becomes an [`EofRule`] and returns ordinal 0.
    pub fn add_token(&mut self, spec: TokenSpec) -> usize {
        let states = self.resolve_states(&spec.states);
        let next_state = spec.next_state.as_deref().map(|s| self.lexical_states.add(s));
        if matches!(spec.regex, Regex::EndOfFile) {
            self.eof_rules.push(EofRule {
                lexical_states: states,
                all_states: spec.all_states,
                next_state,
                position: self.position,
            });
            return 0;
        }

        let literal = match &spec.regex {
            Regex::StringLiteral(s) => Some(s.clone()),
            _ => None,
        };
        if let Some(image) = &literal {
            let clash = self.tokens.iter().any(|t| {
                t.literal.as_ref() == Some(image)
                    && (t.all_states
                        || spec.all_states
                        || t.lexical_states.iter().any(|s| states.contains(s)))
            });
            if clash {
                self.deferred_errors.push((
                    self.position,
                    format!("Duplicate definition of string token \"{}\".", escape(image)).into(),
                ));
            }
        }

        let slot = self.regexes.len();
        self.regexes.push(Some(spec.regex));
        if let Some(label) = &spec.label {
            if self.regex_names.insert(label.clone(), slot).is_some() {
                self.deferred_errors.push((
                    self.position,
                    format!("Multiply defined lexical token name \"{}\".", label).into(),
                ));
            }
        }

        let ordinal = self.tokens.len();
        self.tokens.push(TokenDef {
            label: spec.label,
            regex: slot,
            action: spec.action,
            lexical_states: states,
            all_states: spec.all_states,
            next_state,
            ignore_case: spec.ignore_case,
            literal,
            position: self.position,
        });
        ordinal
    }

    /// Defines a private regular expression (`#NAME`) that other tokens can
    /// refer to but that is never a token itself.
    pub fn private_regex(&mut self, label: &str, regex: Regex) -> usize {
        let slot = self.regexes.len();
        self.regexes.push(Some(regex));
        if self.regex_names.insert(label.into(), slot).is_some() {
            self.deferred_errors.push((
                self.position,
                format!("Multiply defined lexical token name \"{}\".", label).into(),
            ));
        }
        slot
    }

    fn push(&mut self, kind: ExpansionKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Expansion {
            kind,
            parent: Parent::None,
            index_in_parent: 0,
            position: self.position,
        });
        id
    }

    /// A string literal used directly in a production. It reuses a token
    /// with the same image or defines a new one in the default state.
    pub fn literal(&mut self, image: &str) -> NodeId {
        let found = self.tokens.iter().position(|t| match &t.literal {
            Some(l) if t.ignore_case => l.to_lowercase() == image.to_lowercase(),
            Some(l) => l == image,
            None => false,
        });
        let ordinal = match found {
            Some(o) => o,
            None => self.add_token(TokenSpec::new(Regex::literal(image))),
        };
        self.push(ExpansionKind::Token(ordinal))
    }

    /// A reference to a labeled token, resolved by [`Grammar::link`].
    pub fn token(&mut self, label: &str) -> NodeId {
        let id = self.push(ExpansionKind::Token(0));
        self.token_refs.push((id, label.into()));
        id
    }

    pub fn eof(&mut self) -> NodeId {
        self.push(ExpansionKind::Token(0))
    }

    pub fn nonterminal(&mut self, name: &str) -> NodeId {
        self.push(ExpansionKind::NonTerminal {
            name: name.into(),
            production: None,
        })
    }

    pub fn action(&mut self, code: &str) -> NodeId {
        self.push(ExpansionKind::Action(code.into()))
    }

    pub fn lookahead(&mut self, spec: LookaheadSpec) -> NodeId {
        self.push(ExpansionKind::Lookahead(spec))
    }

    /// A sequence of units. Every sequence starts with a lookahead node; an
    /// implicit one is added unless the first unit already is one.
    pub fn sequence(&mut self, units: Vec<NodeId>) -> NodeId {
        let saved = self.position;
        if let Some(&first) = units.first() {
            self.position = self.nodes[first].position;
        }
        let mut all = Vec::with_capacity(units.len() + 1);
        if !units
            .first()
            .is_some_and(|&u| matches!(self.nodes[u].kind, ExpansionKind::Lookahead(_)))
        {
            all.push(self.lookahead(LookaheadSpec::implicit()));
        }
        all.extend(units);
        let id = self.push(ExpansionKind::Sequence(all));
        self.position = saved;
        id
    }

    /// `LOOKAHEAD(spec) units...`
    pub fn sequence_with(&mut self, spec: LookaheadSpec, units: Vec<NodeId>) -> NodeId {
        let saved = self.position;
        if let Some(&first) = units.first() {
            self.position = self.nodes[first].position;
        }
        let la = self.lookahead(spec);
        self.position = saved;
        let mut all = vec![la];
        all.extend(units);
        self.sequence(all)
    }

    /// A choice between alternatives, each wrapped in a sequence. A single
    /// alternative is returned unchanged.
    pub fn choice(&mut self, alternatives: Vec<NodeId>) -> NodeId {
        if alternatives.len() == 1 {
            return alternatives[0];
        }
        let alternatives: Vec<NodeId> = alternatives
            .into_iter()
            .map(|a| match self.nodes[a].kind {
                ExpansionKind::Sequence(_) => a,
                _ => self.sequence(vec![a]),
            })
            .collect();
        let saved = self.position;
        if let Some(&first) = alternatives.first() {
            self.position = self.nodes[first].position;
        }
        let id = self.push(ExpansionKind::Choice(alternatives));
        self.position = saved;
        id
    }

    pub fn one_or_more(&mut self, body: NodeId) -> NodeId {
        self.push(ExpansionKind::OneOrMore(body))
    }

    pub fn zero_or_more(&mut self, body: NodeId) -> NodeId {
        self.push(ExpansionKind::ZeroOrMore(body))
    }

    pub fn zero_or_one(&mut self, body: NodeId) -> NodeId {
        self.push(ExpansionKind::ZeroOrOne(body))
    }

    fn add_production(&mut self, name: &str, expansion: Option<NodeId>) -> usize {
        if self.production_names.idx(name).is_some() {
            self.deferred_errors.push((
                self.position,
                format!("Production \"{}\" has already been defined.", name).into(),
            ));
        }
        self.production_names.add(name);
        self.productions.push(Production {
            name: name.into(),
            expansion,
            position: self.position,
            references: Vec::new(),
            nullable: false,
        });
        self.productions.len() - 1
    }

    /// Defines a production. The first production defined is the start
    /// symbol.
    pub fn production(&mut self, name: &str, expansion: NodeId) -> usize {
        self.add_production(name, Some(expansion))
    }

    /// Declares a production whose parse function is written by hand.
    pub fn code_production(&mut self, name: &str) -> usize {
        self.add_production(name, None)
    }

    pub fn production_index(&self, name: &str) -> Option<usize> {
        self.productions.iter().position(|p| p.name == name)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Expansion {
        &self.nodes[id]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &ExpansionKind {
        &self.nodes[id].kind
    }

    /// Children in tree order. A lookahead's own syntactic expansion is its
    /// child; the enclosing sequence it defaults to is not.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id].kind {
            ExpansionKind::Choice(v) | ExpansionKind::Sequence(v) => v.clone(),
            ExpansionKind::OneOrMore(b) | ExpansionKind::ZeroOrMore(b) | ExpansionKind::ZeroOrOne(b) => {
                vec![*b]
            }
            ExpansionKind::Lookahead(LookaheadSpec { expansion: Some(e), .. })
                if self.nodes[*e].parent == Parent::Node(id) =>
            {
                vec![*e]
            }
            _ => Vec::new(),
        }
    }

    /// Visits `root` and its descendants in preorder. Syntactic lookahead
    /// expansions are entered only if `into_lookahead` is set.
    pub fn walk(&self, root: NodeId, into_lookahead: bool, f: &mut impl FnMut(NodeId)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            f(id);
            if !into_lookahead && matches!(self.nodes[id].kind, ExpansionKind::Lookahead(_)) {
                continue;
            }
            stack.extend(self.children(id).into_iter().rev());
        }
    }

    /// The production a non-terminal node refers to.
    #[inline]
    pub fn production_of(&self, id: NodeId) -> Option<usize> {
        match &self.nodes[id].kind {
            ExpansionKind::NonTerminal { production, .. } => *production,
            _ => None,
        }
    }

    /// Whether the expansion can match the empty token sequence.
    pub fn is_nullable(&self, id: NodeId) -> bool {
        match &self.nodes[id].kind {
            ExpansionKind::Token(_) => false,
            ExpansionKind::NonTerminal { production, .. } => {
                production.is_some_and(|p| self.productions[p].nullable)
            }
            ExpansionKind::Choice(v) => v.iter().any(|&c| self.is_nullable(c)),
            ExpansionKind::Sequence(v) => v.iter().all(|&c| self.is_nullable(c)),
            ExpansionKind::OneOrMore(b) => self.is_nullable(*b),
            ExpansionKind::ZeroOrMore(_)
            | ExpansionKind::ZeroOrOne(_)
            | ExpansionKind::Lookahead(_)
            | ExpansionKind::Action(_) => true,
        }
    }

    /// Human-readable token: the quoted literal, `<LABEL>` or `<EOF>`.
    pub fn token_image(&self, ordinal: usize) -> String {
        if ordinal == 0 {
            return "<EOF>".into();
        }
        match self.tokens.get(ordinal) {
            Some(TokenDef { literal: Some(l), .. }) => format!("\"{}\"", escape(l)).into(),
            Some(TokenDef { label: Some(l), .. }) => format!("<{}>", l).into(),
            _ => format!("<token of kind {}>", ordinal).into(),
        }
    }

    /// The first lookahead unit of a sequence, with its node id.
    pub fn leading_lookahead(&self, id: NodeId) -> Option<(NodeId, &LookaheadSpec)> {
        let ExpansionKind::Sequence(units) = &self.nodes[id].kind else {
            return None;
        };
        let &first = units.first()?;
        match &self.nodes[first].kind {
            ExpansionKind::Lookahead(spec) => Some((first, spec)),
            _ => None,
        }
    }

    /// Resolves names, records parent links and production references,
    /// computes nullability and checks the expansion tree.
    pub fn link(&mut self, ctx: &mut CompilationContext) {
        for (pos, msg) in std::mem::take(&mut self.deferred_errors) {
            ctx.semantic_error(pos, msg);
        }
        self.resolve_regex_names(ctx);
        self.resolve_token_refs(ctx);
        self.resolve_nonterminals(ctx);
        self.set_parents();
        self.fill_lookahead_defaults();
        self.compute_nullable();
        self.check_expansions(ctx);
        self.linked = true;
        log::debug!(
            "linked grammar: {} tokens, {} productions, {} nodes, {} lexical states",
            self.tokens.len(),
            self.productions.len(),
            self.nodes.len(),
            self.lexical_states.len()
        );
    }

    fn resolve_regex_names(&mut self, ctx: &mut CompilationContext) {
        let positions: Vec<Position> = {
            let mut v = vec![Position::start(); self.regexes.len()];
            for t in &self.tokens {
                v[t.regex] = t.position;
            }
            v
        };
        let names = &self.regex_names;
        for (slot, regex) in self.regexes.iter_mut().enumerate() {
            let Some(regex) = regex else { continue };
            regex.for_each_name_mut(&mut |label, target| match names.get(label) {
                Some(&id) => *target = Some(id),
                None => ctx.semantic_error(
                    positions[slot],
                    format!("Undefined lexical token name \"{}\".", label),
                ),
            });
        }
    }

    fn resolve_token_refs(&mut self, ctx: &mut CompilationContext) {
        for (node, label) in std::mem::take(&mut self.token_refs) {
            let pos = self.nodes[node].position;
            let ordinal = self
                .tokens
                .iter()
                .position(|t| t.label.as_deref() == Some(label.as_str()));
            match ordinal {
                Some(o) => self.nodes[node].kind = ExpansionKind::Token(o),
                None if self.regex_names.contains_key(&label) => ctx.semantic_error(
                    pos,
                    format!("Token name \"{}\" refers to a private regular expression.", label),
                ),
                None => ctx.semantic_error(
                    pos,
                    format!("Undefined lexical token name \"{}\".", label),
                ),
            }
        }
    }

    fn resolve_nonterminals(&mut self, ctx: &mut CompilationContext) {
        for i in 0..self.nodes.len() {
            let pos = self.nodes[i].position;
            if let ExpansionKind::NonTerminal { name, production } = &mut self.nodes[i].kind {
                match self.production_names.idx(name) {
                    Some(p) => *production = Some(p),
                    None => ctx.semantic_error(
                        pos,
                        format!("Non-terminal {} has not been defined.", name),
                    ),
                }
            }
        }
    }

    fn set_parents(&mut self) {
        for p in &mut self.productions {
            p.references.clear();
        }
        for p in 0..self.productions.len() {
            let Some(root) = self.productions[p].expansion else {
                continue;
            };
            self.nodes[root].parent = Parent::Production(p);
            self.nodes[root].index_in_parent = 0;
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let children = match &self.nodes[id].kind {
                    ExpansionKind::Choice(v) | ExpansionKind::Sequence(v) => v.clone(),
                    ExpansionKind::OneOrMore(b)
                    | ExpansionKind::ZeroOrMore(b)
                    | ExpansionKind::ZeroOrOne(b) => vec![*b],
                    ExpansionKind::Lookahead(LookaheadSpec { expansion: Some(e), .. })
                        if self.nodes[*e].parent == Parent::None =>
                    {
                        vec![*e]
                    }
                    ExpansionKind::NonTerminal { production: Some(target), .. } => {
                        let target = *target;
                        self.productions[target].references.push(id);
                        Vec::new()
                    }
                    _ => Vec::new(),
                };
                for (i, c) in children.iter().enumerate() {
                    self.nodes[*c].parent = Parent::Node(id);
                    self.nodes[*c].index_in_parent = i;
                }
                stack.extend(children.into_iter().rev());
            }
        }
    }

    fn fill_lookahead_defaults(&mut self) {
        for id in 0..self.nodes.len() {
            let parent = self.nodes[id].parent;
            if let ExpansionKind::Lookahead(spec) = &mut self.nodes[id].kind {
                if spec.expansion.is_none() {
                    spec.expansion = Some(match parent {
                        Parent::Node(p) => p,
                        _ => id,
                    });
                }
            }
        }
    }

    fn compute_nullable(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for p in 0..self.productions.len() {
                if self.productions[p].nullable {
                    continue;
                }
                if let Some(e) = self.productions[p].expansion {
                    if self.is_nullable(e) {
                        self.productions[p].nullable = true;
                        changed = true;
                    }
                }
            }
        }
    }

    fn check_expansions(&self, ctx: &mut CompilationContext) {
        for id in 0..self.nodes.len() {
            let node = &self.nodes[id];
            if node.parent == Parent::None {
                continue;
            }
            let construct = match node.kind {
                ExpansionKind::OneOrMore(b) => Some(("(...)+", b)),
                ExpansionKind::ZeroOrMore(b) => Some(("(...)*", b)),
                ExpansionKind::ZeroOrOne(b) => Some(("[...]", b)),
                _ => None,
            };
            if let Some((image, body)) = construct {
                if self.is_nullable(body) {
                    ctx.semantic_error(
                        node.position,
                        format!("Expansion within \"{}\" can be matched by empty string.", image),
                    );
                }
            }
            if let ExpansionKind::Lookahead(spec) = &node.kind {
                if spec.explicit && !self.at_choice_point(id) {
                    ctx.warning(
                        node.position,
                        "Encountered LOOKAHEAD(s) at a non-choice point.  Will be ignored.",
                    );
                }
            }
        }
    }

    /// A lookahead is at a choice point when it leads a sequence that is an
    /// alternative of a choice or the body of `(...)*`, `(...)+` or `[...]`.
    fn at_choice_point(&self, la: NodeId) -> bool {
        let node = &self.nodes[la];
        let Parent::Node(seq) = node.parent else {
            return false;
        };
        if node.index_in_parent != 0 || !matches!(self.nodes[seq].kind, ExpansionKind::Sequence(_)) {
            return false;
        }
        match self.nodes[seq].parent {
            Parent::Node(p) => matches!(
                self.nodes[p].kind,
                ExpansionKind::Choice(_)
                    | ExpansionKind::OneOrMore(_)
                    | ExpansionKind::ZeroOrMore(_)
                    | ExpansionKind::ZeroOrOne(_)
            ),
            _ => false,
        }
    }
}

/// Escapes a literal for display inside double quotes.
pub fn escape(s: &str) -> std::string::String {
    let mut out = std::string::String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}
