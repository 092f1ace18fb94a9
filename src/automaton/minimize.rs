// src/automaton/minimize.rs
//! Partition refinement over the states of a subset-constructed DFA.
//!
//! Groups are dense indices while refining; the returned automaton gets the
//! id `"entry"` for its entry state and random ids for everything else.

use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};
use hashbrown::{HashMap, HashSet};
use rand::Rng;
use rayon::prelude::*;

use super::{
    dfa::{Dfa, DfaState},
    tokens::{Token, merge_actions},
};

pub const ENTRY_ID: &str = "entry";

/// One group of non-accepting states, plus one group per sorted list of
/// action names.
fn initial_partition(dfa: &Dfa) -> Vec<Vec<usize>> {
    let mut rejecting = Vec::new();
    let mut accepting: BTreeMap<Vec<&str>, Vec<usize>> = BTreeMap::new();
    for (i, state) in dfa.states.iter().enumerate() {
        if state.is_accepting() {
            let mut names = state.action_names();
            names.sort_unstable();
            accepting.entry(names).or_default().push(i);
        } else {
            rejecting.push(i);
        }
    }
    let mut groups = Vec::with_capacity(accepting.len() + 1);
    if !rejecting.is_empty() {
        groups.push(rejecting);
    }
    groups.extend(accepting.into_values());
    groups
}

fn signature(dfa: &Dfa, state: usize, alphabet: &[Token], group_of: &[usize]) -> Result<Vec<usize>> {
    alphabet
        .iter()
        .map(|token| {
            dfa.resolve(state, token)
                .map(|target| group_of[target])
                .ok_or_else(|| {
                    anyhow!(
                        "cannot minimize: state {:?} has no transition for {} and no ANY fallback",
                        dfa.states[state].id,
                        token
                    )
                })
        })
        .collect()
}

fn index_groups(groups: &[Vec<usize>], n: usize) -> Vec<usize> {
    let mut group_of = vec![0; n];
    for (g, members) in groups.iter().enumerate() {
        for &s in members {
            group_of[s] = g;
        }
    }
    group_of
}

/// Splits groups until every member of a group agrees on where each token
/// leads. Returns the final groups and the state -> group index.
pub fn refine(dfa: &Dfa) -> Result<(Vec<Vec<usize>>, Vec<usize>)> {
    let alphabet = dfa.alphabet();
    let mut groups = initial_partition(dfa);
    let mut group_of = index_groups(&groups, dfa.states.len());
    let mut rounds = 0usize;

    loop {
        rounds += 1;
        let signatures: Vec<Vec<usize>> = (0..dfa.states.len())
            .into_par_iter()
            .map(|s| signature(dfa, s, &alphabet, &group_of))
            .collect::<Result<_>>()?;

        let mut next = Vec::with_capacity(groups.len());
        for members in &groups {
            // Keep first-seen order so the group holding a given member stays stable.
            let mut split: Vec<Vec<usize>> = Vec::new();
            let mut by_sig: HashMap<&[usize], usize> = HashMap::new();
            for &s in members {
                let slot = *by_sig.entry(signatures[s].as_slice()).or_insert_with(|| {
                    split.push(Vec::new());
                    split.len() - 1
                });
                split[slot].push(s);
            }
            next.extend(split);
        }

        let changed = next.len() != groups.len();
        groups = next;
        group_of = index_groups(&groups, dfa.states.len());
        if !changed {
            break;
        }
    }

    log::debug!(
        "[automaton] refinement: {} states -> {} groups in {} rounds",
        dfa.states.len(),
        groups.len(),
        rounds
    );
    Ok((groups, group_of))
}

fn fresh_group_id(rng: &mut impl Rng, used: &mut HashSet<String>) -> String {
    loop {
        let id = format!("{:016x}", rng.random::<u64>());
        if used.insert(id.clone()) {
            return id;
        }
    }
}

/// The entry represents its group whenever it is a member.
fn delegate(dfa: &Dfa, members: &[usize]) -> usize {
    if members.contains(&dfa.entry) {
        dfa.entry
    } else {
        members[0]
    }
}

/// Collapses every group to one delegate state and returns a new automaton
/// holding only the groups reachable from the entry.
pub fn minimize_dfa(dfa: &Dfa) -> Result<Dfa> {
    let (groups, group_of) = refine(dfa)?;

    // Renumber groups in BFS order from the entry group.
    let entry_group = group_of[dfa.entry];
    let mut order = vec![usize::MAX; groups.len()];
    let mut visit = Vec::new();
    let mut queue = VecDeque::from([entry_group]);
    order[entry_group] = 0;
    while let Some(g) = queue.pop_front() {
        visit.push(g);
        for &target in dfa.states[delegate(dfa, &groups[g])].shift.values() {
            let tg = group_of[target];
            if order[tg] == usize::MAX {
                order[tg] = visit.len() + queue.len();
                queue.push_back(tg);
            }
        }
    }

    let mut rng = rand::rng();
    let mut used = HashSet::from([ENTRY_ID.to_string()]);
    let states = visit
        .iter()
        .map(|&g| {
            let members = &groups[g];
            let head = &dfa.states[delegate(dfa, members)];

            let actions = head.actions.as_ref().map(|own| {
                let mut merged = own.clone();
                for &m in members {
                    merge_actions(&mut merged, dfa.states[m].actions.iter().flatten());
                }
                merged
            });
            let shift = head
                .shift
                .iter()
                .map(|(token, &target)| (token.clone(), order[group_of[target]]))
                .collect();
            let id = if g == entry_group {
                ENTRY_ID.to_string()
            } else {
                fresh_group_id(&mut rng, &mut used)
            };
            DfaState { id, actions, shift }
        })
        .collect();

    Ok(Dfa { states, entry: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{
        dfa::nfa_to_dfa,
        nfa::{Nfa, NodeIdIssuer},
        tokens::ActionSpec,
    };

    fn raw(actions: &[ActionSpec]) -> Dfa {
        nfa_to_dfa(&Nfa::build(actions, &mut NodeIdIssuer::new())).unwrap()
    }

    #[test]
    fn entry_keeps_recognizable_id() {
        let min = minimize_dfa(&raw(&[ActionSpec::new("ab", [["a", "b"]])])).unwrap();
        assert_eq!(min.entry_state().id, ENTRY_ID);
        assert_eq!(min.entry, 0);
    }

    #[test]
    fn equivalent_states_collapse() {
        // The states after 'x' and after 'y' are different closures that lead
        // to the same places on every token.
        let dfa = raw(&[ActionSpec::new("hit", [["x", "a"], ["y", "a"]])]);
        let min = minimize_dfa(&dfa).unwrap();
        assert!(min.states.len() < dfa.states.len());
        let accepting = min.states.iter().filter(|s| s.is_accepting()).count();
        assert_eq!(accepting, 1);
    }

    #[test]
    fn different_action_sets_are_never_merged() {
        let min = minimize_dfa(&raw(&[
            ActionSpec::new("left", [["a"]]),
            ActionSpec::new("right", [["b"]]),
        ]))
        .unwrap();
        let names: Vec<_> = min
            .states
            .iter()
            .filter(|s| s.is_accepting())
            .map(|s| s.action_names().join(","))
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"left".to_string()));
        assert!(names.contains(&"right".to_string()));
    }

    #[test]
    fn ids_are_unique() {
        let min = minimize_dfa(&raw(&[
            ActionSpec::new("one", [["a", "b", "c"]]),
            ActionSpec::new("two", [["c", "b", "a"]]),
        ]))
        .unwrap();
        let ids: HashSet<_> = min.states.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), min.states.len());
    }

    #[test]
    fn preserves_actions_on_fixed_streams() {
        let actions = [
            ActionSpec::new("ab", [["a", "b"]]),
            ActionSpec::new("bab", [["b", "a", "b"]]),
            ActionSpec::new("aa", [["a", "a"]]).immediate(),
        ];
        let dfa = raw(&actions);
        let min = minimize_dfa(&dfa).unwrap();
        for stream in ["abab", "aaab", "babba", "zzab", "bbbaab"] {
            let inputs: Vec<String> = stream.chars().map(String::from).collect();
            let sorted = |t: Vec<Vec<String>>| {
                t.into_iter()
                    .map(|mut v| {
                        v.sort();
                        v
                    })
                    .collect::<Vec<_>>()
            };
            let a = sorted(dfa.trace(inputs.iter().map(String::as_str)).unwrap());
            let b = sorted(min.trace(inputs.iter().map(String::as_str)).unwrap());
            assert_eq!(a, b, "stream {stream}");
        }
    }

    #[test]
    fn state_without_fallback_is_reported() {
        let mut dfa = raw(&[ActionSpec::new("ab", [["a", "b"]])]);
        let last = dfa.states.len() - 1;
        dfa.states[last].shift.remove(&Token::Any);
        let err = minimize_dfa(&dfa).unwrap_err();
        assert!(err.to_string().contains("no ANY fallback"), "{err}");
    }
}
