use super::nfa::Nfa;
use crate::error::GenError;
use std::collections::{BTreeSet, HashMap};

/// Computes epsilon closures for every state and, if `reduce` is set,
/// merges equivalent states inside each closure.
///
/// Merging creates new states; only those are closed again afterwards.
/// Closing the original states a second time would bring back the members
/// that were just merged away.
pub fn compute_closures(nfa: &mut Nfa, reduce: bool) -> Result<(), GenError> {
    close(nfa, 0);
    if !reduce {
        return Ok(());
    }
    let original = nfa.len();
    let mut memo: HashMap<Vec<usize>, usize> = HashMap::new();
    for s in 0..original {
        reduce_state(nfa, s, &mut memo)?;
    }
    if nfa.len() > original {
        log::trace!("state reduction added {} states", nfa.len() - original);
        close(nfa, original);
    }
    Ok(())
}

/// Closes states `from..` to a fixed point, then keeps only useful states
/// in each set. A state with transitions stays in its own set.
fn close(nfa: &mut Nfa, from: usize) {
    let n = nfa.len();
    let mut changed = true;
    while changed {
        changed = false;
        for s in from..n {
            let targets: Vec<usize> = nfa.states[s].epsilon_moves.iter().copied().collect();
            for t in targets {
                if t == s {
                    continue;
                }
                let (reach, kind) = {
                    let target = &nfa.states[t];
                    (target.epsilon_moves.clone(), target.kind)
                };
                let state = &mut nfa.states[s];
                changed |= state.lower_kind(kind);
                for r in reach {
                    changed |= state.epsilon_moves.insert(r);
                }
            }
        }
    }

    for s in from..n {
        let useful: BTreeSet<usize> = nfa.states[s]
            .epsilon_moves
            .iter()
            .copied()
            .filter(|&t| t != s && nfa.states[t].is_useful())
            .collect();
        let state = &mut nfa.states[s];
        state.epsilon_moves = useful;
        if state.has_transitions() {
            state.epsilon_moves.insert(s);
        }
    }
}

fn reduce_state(
    nfa: &mut Nfa,
    s: usize,
    memo: &mut HashMap<Vec<usize>, usize>,
) -> Result<(), GenError> {
    let mut moves: Vec<usize> = nfa.states[s].epsilon_moves.iter().copied().collect();
    loop {
        let mut optimized = false;

        // States with identical move tables become one state whose next
        // state is active wherever any member's next state was.
        let mut i = 0;
        while i < moves.len() {
            let a = moves[i];
            if nfa.states[a].has_transitions() {
                let mut equiv = vec![a];
                let mut j = i + 1;
                while j < moves.len() {
                    let b = moves[j];
                    if nfa.states[b].has_transitions() && nfa.states[a].same_moves(&nfa.states[b]) {
                        equiv.push(b);
                        moves.remove(j);
                    } else {
                        j += 1;
                    }
                }
                if equiv.len() > 1 {
                    equiv.sort_unstable();
                    moves[i] = match memo.get(&equiv) {
                        Some(&merged) => merged,
                        None => {
                            let merged = equivalent_state(nfa, &equiv);
                            memo.insert(equiv, merged);
                            merged
                        }
                    };
                    optimized = true;
                }
            }
            i += 1;
        }

        // States continuing at the same next state share one move table.
        let mut i = 0;
        while i < moves.len() {
            let a = moves[i];
            let mut merged: Option<usize> = None;
            let mut j = i + 1;
            while j < moves.len() {
                let b = moves[j];
                if nfa.states[a].next == nfa.states[b].next {
                    let m = match merged {
                        Some(m) => m,
                        None => {
                            let id = nfa.len();
                            let copy = nfa.states[a].clone_moves(id);
                            nfa.states.push(copy);
                            merged = Some(id);
                            optimized = true;
                            id
                        }
                    };
                    nfa.merge_moves(m, b)?;
                    moves.remove(j);
                } else {
                    j += 1;
                }
            }
            match merged {
                Some(m) => {
                    moves.remove(i);
                    moves.push(m);
                }
                None => i += 1,
            }
        }

        if !optimized {
            break;
        }
    }
    nfa.states[s].epsilon_moves = moves.into_iter().collect();
    Ok(())
}

/// Creates the state standing for `members`, which all have the same moves.
fn equivalent_state(nfa: &mut Nfa, members: &[usize]) -> usize {
    let id = nfa.len();
    let mut state = nfa.states[members[0]].clone_moves(id);
    nfa.states.push(state.clone());
    let next = nfa.new_state();
    state.next = Some(next);
    for &m in members {
        let (kind, is_final, member_next) = {
            let member = &nfa.states[m];
            (member.kind, member.is_final, member.next)
        };
        state.lower_kind(kind);
        state.is_final |= is_final;
        if let Some(n) = member_next {
            nfa.add_epsilon(next, n);
        }
    }
    nfa.states[id] = state;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// `start -ε-> a -'x'-> a_end(final 1)`, `start -ε-> b -'x'-> b_end(final 2)`
    fn twin_moves() -> (Nfa, usize) {
        let mut nfa = Nfa::new();
        let start = nfa.new_state();
        for kind in [1, 2] {
            let s = nfa.new_state();
            let e = nfa.new_state();
            nfa.states[s].add_char('x');
            nfa.states[s].next = Some(e);
            nfa.states[e].is_final = true;
            nfa.states[e].kind = Some(kind);
            nfa.add_epsilon(start, s);
        }
        (nfa, start)
    }

    #[test]
    fn closure_is_transitive_and_filtered() {
        init_logger();
        let mut nfa = Nfa::new();
        let a = nfa.new_state();
        let b = nfa.new_state();
        let c = nfa.new_state();
        let d = nfa.new_state();
        nfa.add_epsilon(a, b);
        nfa.add_epsilon(b, c);
        nfa.states[c].add_char('q');
        nfa.states[c].next = Some(d);
        nfa.add_epsilon(c, d);
        nfa.states[d].is_final = true;
        nfa.states[d].kind = Some(3);
        compute_closures(&mut nfa, false).unwrap();

        assert_eq!(nfa.states[a].epsilon_moves, BTreeSet::from([c, d]));
        assert_eq!(nfa.states[a].kind, Some(3));
        assert_eq!(nfa.states[c].epsilon_moves, BTreeSet::from([c, d]));
        assert!(nfa.states[d].epsilon_moves.is_empty());
    }

    #[test]
    fn closure_is_idempotent() {
        init_logger();
        let (mut nfa, _) = twin_moves();
        let s = nfa.new_state();
        nfa.add_epsilon(s, 0);
        nfa.add_epsilon(0, s);
        compute_closures(&mut nfa, false).unwrap();
        let once = nfa.clone();
        compute_closures(&mut nfa, false).unwrap();
        assert_eq!(nfa, once);
    }

    #[test]
    fn identical_moves_are_merged() {
        init_logger();
        let (mut nfa, start) = twin_moves();
        let original = nfa.len();
        compute_closures(&mut nfa, true).unwrap();

        let set: Vec<usize> = nfa.states[start].epsilon_moves.iter().copied().collect();
        assert_eq!(set.len(), 1);
        let merged = &nfa.states[set[0]];
        assert!(merged.id >= original);
        let next = merged.next.unwrap();
        assert_eq!(nfa.states[next].kind, Some(1));
        assert_eq!(nfa.states[next].epsilon_moves, BTreeSet::from([2, 4]));
    }

    #[test]
    fn shared_next_states_are_merged() {
        init_logger();
        let mut nfa = Nfa::new();
        let start = nfa.new_state();
        let end = nfa.new_state();
        nfa.states[end].is_final = true;
        nfa.states[end].kind = Some(1);
        for c in ['a', 'b'] {
            let s = nfa.new_state();
            nfa.states[s].add_char(c);
            nfa.states[s].next = Some(end);
            nfa.add_epsilon(start, s);
        }
        compute_closures(&mut nfa, true).unwrap();

        let set: Vec<usize> = nfa.states[start].epsilon_moves.iter().copied().collect();
        assert_eq!(set.len(), 1);
        let merged = &nfa.states[set[0]];
        assert_eq!(merged.next, Some(end));
        assert_ne!(merged.ascii_moves[1] & (1 << ('a' as u64 - 64)), 0);
        assert_ne!(merged.ascii_moves[1] & (1 << ('b' as u64 - 64)), 0);
        assert_eq!(merged.epsilon_moves, BTreeSet::from([merged.id]));
    }
}
