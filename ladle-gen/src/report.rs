//! Text dumps of compiled grammars.
//!
//! Every writer prints one record per line. A record starts with a short tag
//! followed by comma-separated fields, so dumps can be compared line by line.

use crate::grammar::{ExpansionKind, Grammar, escape};
use crate::lexgen::{LexerTables, LexicalStateTable};
use crate::lookahead::ambiguity::{construct_image, image};
use crate::lookahead::{Conflict, ConflictKind, Decision, DecisionKind, LookaheadEngine, LookaheadPlan};
use ladle::ScanState;
use std::io::{self, Write};

fn amount_image(amount: usize) -> std::string::String {
    if amount == usize::MAX {
        "inf".to_string()
    } else {
        amount.to_string()
    }
}

fn opt_image(v: Option<usize>) -> std::string::String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn char_image(c: char) -> std::string::String {
    escape(&c.to_string())
}

/// The characters a runtime state moves on, ASCII runs collapsed into
/// ranges.
fn moves_image(state: &ScanState) -> std::string::String {
    let mut parts = Vec::new();
    let mut code = 0u32;
    while code < 128 {
        if state.ascii_moves[(code >> 6) as usize] & (1u64 << (code & 63)) == 0 {
            code += 1;
            continue;
        }
        let lo = code;
        while code + 1 < 128 && state.ascii_moves[((code + 1) >> 6) as usize] & (1u64 << ((code + 1) & 63)) != 0 {
            code += 1;
        }
        let (a, b) = (char::from(lo as u8), char::from(code as u8));
        if lo == code {
            parts.push(char_image(a));
        } else {
            parts.push(format!("{}-{}", char_image(a), char_image(b)));
        }
        code += 1;
    }
    for &c in &state.char_moves {
        parts.push(char_image(c));
    }
    for &(lo, hi) in &state.range_moves {
        parts.push(format!("{}-{}", char_image(lo), char_image(hi)));
    }
    parts.join(" ")
}

/// Writes the runtime automaton of every lexical state.
///
/// # Output Format
/// ```text
/// LS,<number of lexical states>
///
/// L,<name>,<states>,<initial>,<empty-match kind>
/// S,<state>,<kind>,<next set>,{<moves>}
/// N,<next set>,{<state>, ...}
/// C,<composite id>,{<state>, ...}
/// ```
pub fn write_lexer<W: Write>(out: &mut W, tables: &LexerTables) -> io::Result<()> {
    writeln!(out, "LS,{}\n", tables.states.len())?;
    for state in &tables.states {
        write_lexical_state(out, state, tables)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_lexical_state<W: Write>(out: &mut W, table: &LexicalStateTable, tables: &LexerTables) -> io::Result<()> {
    let mode = table.to_scan_mode();
    let label = |k: Option<usize>| match k.and_then(|k| tables.kinds.get(k)) {
        Some(info) => info.label.to_string(),
        None => opt_image(k),
    };
    writeln!(
        out,
        "L,{},{},{},{}",
        table.name,
        mode.states.len(),
        opt_image(mode.initial),
        label(mode.empty_match)
    )?;
    for (i, s) in mode.states.iter().enumerate() {
        writeln!(out, "S,{},{},{},{{{}}}", i, label(s.kind), opt_image(s.next_set), moves_image(s))?;
    }
    for (i, set) in mode.next_sets.iter().enumerate() {
        write!(out, "N,{},{{", i)?;
        for s in set {
            write!(out, "{}, ", s)?;
        }
        writeln!(out, "}}")?;
    }
    for (k, members) in mode.composites.iter().enumerate() {
        write!(out, "C,{},{{", table.composite_id(k))?;
        for s in members {
            write!(out, "{}, ", s)?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Writes the FIRST sequences of every choice alternative, up to `limit`
/// tokens each.
///
/// # Output Format
/// ```text
/// F,<production>,<choice node>,<alternative>,{<tokens>; ...}
/// ```
pub fn write_first_sets<W: Write>(out: &mut W, grammar: &Grammar, limit: usize) -> io::Result<()> {
    let mut engine = LookaheadEngine::new(grammar);
    for p in &grammar.productions {
        let Some(root) = p.expansion else {
            continue;
        };
        let mut choices = Vec::new();
        grammar.walk(root, false, &mut |id| {
            if matches!(grammar.kind(id), ExpansionKind::Choice(_)) {
                choices.push(id);
            }
        });
        for choice in choices {
            let ExpansionKind::Choice(alternatives) = grammar.kind(choice) else {
                continue;
            };
            for (i, &alt) in alternatives.iter().enumerate() {
                write!(out, "F,{},{},{},{{", p.name, choice, i)?;
                for seq in engine.first_sequences(alt, limit) {
                    write!(out, "{}; ", image(grammar, &seq))?;
                }
                writeln!(out, "}}")?;
            }
        }
    }
    Ok(())
}

/// Writes one line per ambiguity conflict.
///
/// # Output Format
/// ```text
/// X,<position>,<construct>,<required lookahead>,<resolved>,<prefix>
/// ```
pub fn write_conflicts<W: Write>(out: &mut W, grammar: &Grammar, conflicts: &[Conflict]) -> io::Result<()> {
    writeln!(out, "XS,{}\n", conflicts.len())?;
    for c in conflicts {
        let construct = match c.kind {
            ConflictKind::Choice { other } => format!("choice {}/{}", c.node, other),
            ConflictKind::Repetition => construct_image(grammar.kind(c.node)).to_string(),
        };
        writeln!(
            out,
            "X,{},{},{},{},{}",
            grammar.node(c.node).position,
            construct,
            c.required_lookahead,
            if c.within_bound { "resolved" } else { "unresolved" },
            image(grammar, &c.prefix)
        )?;
    }
    Ok(())
}

fn decision_image(grammar: &Grammar, decision: &Decision) -> std::string::String {
    match decision {
        Decision::Always => "always".to_string(),
        Decision::Unreachable => "unreachable".to_string(),
        Decision::Semantic(predicate) => format!("semantic {{{}}}", predicate),
        Decision::Switch(kinds) => {
            let cases: Vec<_> = kinds.iter().map(|&k| grammar.token_image(k)).collect();
            format!("switch [{}]", cases.join(" "))
        }
        Decision::Scan {
            routine,
            amount,
            semantic,
        } => match semantic {
            Some(predicate) => format!("scan {} {} && {{{}}}", routine, amount_image(*amount), predicate),
            None => format!("scan {} {}", routine, amount_image(*amount)),
        },
    }
}

/// Writes the decisions, entry routines and bounded scan routines of a
/// lookahead plan.
///
/// # Output Format
/// ```text
/// DS,<number of decision points>
///
/// D,<node>,<construct>
/// B,<alternative>,<decision>
///
/// J,<routine>,<expansion>,<amount>
/// R,<routine>,<expansion>,<budget>,<minimum size>,<checks semantic>
/// ```
pub fn write_plan<W: Write>(out: &mut W, grammar: &Grammar, plan: &LookaheadPlan) -> io::Result<()> {
    writeln!(out, "DS,{}\n", plan.decisions.len())?;
    for d in &plan.decisions {
        let construct = match d.kind {
            DecisionKind::Choice => "choice",
            DecisionKind::OneOrMore => "(...)+",
            DecisionKind::ZeroOrMore => "(...)*",
            DecisionKind::ZeroOrOne => "[...]",
        };
        writeln!(out, "D,{},{}", d.node, construct)?;
        for (i, b) in d.branches.iter().enumerate() {
            writeln!(out, "B,{},{}", i, decision_image(grammar, &b.decision))?;
        }
    }
    writeln!(out)?;
    for e in &plan.entry_routines {
        writeln!(out, "J,{},{},{}", e.name, e.expansion, amount_image(e.amount))?;
    }
    for r in &plan.routines {
        writeln!(
            out,
            "R,{},{},{},{},{}",
            r.name,
            r.expansion,
            amount_image(r.budget),
            amount_image(r.minimum_size),
            r.checks_semantic
        )?;
    }
    Ok(())
}
