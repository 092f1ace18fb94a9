// src/automaton/dfa.rs
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::{Result, anyhow, bail};
use hashbrown::HashMap;

use super::{
    nfa::Nfa,
    tokens::{ActionRecord, Token, merge_actions},
};

/// Set of NFA arena indices. Ordered, so equal sets compare equal.
pub type NfaSet = BTreeSet<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfaState {
    pub id: String,
    pub actions: Option<Vec<ActionRecord>>,
    /// Token -> arena index of the destination state.
    pub shift: BTreeMap<Token, usize>,
}

impl DfaState {
    pub fn is_accepting(&self) -> bool {
        self.actions.is_some()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions
            .iter()
            .flatten()
            .map(|a| a.name.as_str())
            .collect()
    }
}

/// Deterministic automaton stored as an arena; transitions are indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    pub states: Vec<DfaState>,
    pub entry: usize,
}

impl Dfa {
    pub fn entry_state(&self) -> &DfaState {
        &self.states[self.entry]
    }

    /// Exact edge first, then the `Any` fallback.
    pub fn resolve(&self, state: usize, token: &Token) -> Option<usize> {
        let shift = &self.states[state].shift;
        shift.get(token).or_else(|| shift.get(&Token::Any)).copied()
    }

    /// Advances one literal token. A state with neither an exact nor a
    /// wildcard edge means the automaton is malformed.
    pub fn step(&self, state: usize, input: &str) -> Result<usize> {
        let token = Token::literal(input);
        self.resolve(state, &token).ok_or_else(|| {
            anyhow!(
                "malformed automaton: state {:?} has no transition for {:?} and no ANY fallback",
                self.states[state].id,
                input
            )
        })
    }

    /// Walks `inputs` from the entry and returns the action names seen after
    /// each token (empty when the state is not accepting).
    pub fn trace<'a, I>(&self, inputs: I) -> Result<Vec<Vec<String>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.entry;
        let mut out = Vec::new();
        for input in inputs {
            state = self.step(state, input)?;
            out.push(
                self.states[state]
                    .action_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            );
        }
        Ok(out)
    }

    /// Every token that labels at least one edge, in `Token` order.
    pub fn alphabet(&self) -> Vec<Token> {
        let tokens: BTreeSet<&Token> = self.states.iter().flat_map(|s| s.shift.keys()).collect();
        tokens.into_iter().cloned().collect()
    }

    /// Indices reachable from the entry, in BFS order.
    pub fn reachable(&self) -> Vec<usize> {
        let mut seen = vec![false; self.states.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.entry]);
        seen[self.entry] = true;
        while let Some(s) = queue.pop_front() {
            order.push(s);
            for &t in self.states[s].shift.values() {
                if !seen[t] {
                    seen[t] = true;
                    queue.push_back(t);
                }
            }
        }
        order
    }

    /// Fails if some reachable state cannot resolve an unseen token.
    pub fn check_totality(&self) -> Result<()> {
        for s in self.reachable() {
            let state = &self.states[s];
            if !state.shift.contains_key(&Token::Any) {
                bail!(
                    "automaton is not total: state {:?} has no ANY transition",
                    state.id
                );
            }
        }
        Ok(())
    }
}

/// Grows `set` along epsilon edges until nothing new is added.
pub fn epsilon_closure(nfa: &Nfa, set: NfaSet) -> NfaSet {
    let mut closure = set;
    let mut queue: VecDeque<usize> = closure.iter().copied().collect();
    while let Some(i) = queue.pop_front() {
        let Some(targets) = nfa.nodes[i].shifts.get(&Token::Epsilon) else {
            continue;
        };
        for &t in targets {
            if closure.insert(t) {
                queue.push_back(t);
            }
        }
    }
    closure
}

/// Canonical DFA key: NFA ids sorted numerically, comma separated.
pub fn calculate_dfa_id(nfa: &Nfa, set: &NfaSet) -> String {
    let mut ids: Vec<u32> = set.iter().map(|&i| nfa.nodes[i].id).collect();
    ids.sort_unstable();
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn collect_dfa_actions(nfa: &Nfa, set: &NfaSet) -> Option<Vec<ActionRecord>> {
    let mut out = Vec::new();
    for &i in set {
        if let Some(actions) = &nfa.nodes[i].actions {
            merge_actions(&mut out, actions);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Subset construction.
pub fn nfa_to_dfa(nfa: &Nfa) -> Result<Dfa> {
    let entry_closure = epsilon_closure(nfa, NfaSet::from([nfa.start]));
    let mut states = vec![DfaState {
        id: calculate_dfa_id(nfa, &entry_closure),
        actions: collect_dfa_actions(nfa, &entry_closure),
        shift: BTreeMap::new(),
    }];
    let mut by_id: HashMap<String, usize> = HashMap::new();
    by_id.insert(states[0].id.clone(), 0);
    let mut queue = VecDeque::from([(entry_closure, 0usize)]);

    while let Some((closure, index)) = queue.pop_front() {
        let inputs: BTreeSet<&Token> = closure
            .iter()
            .flat_map(|&i| nfa.nodes[i].shifts.keys())
            .filter(|t| **t != Token::Epsilon)
            .collect();

        for input in inputs {
            let mut destination = NfaSet::new();
            for &i in &closure {
                let shifts = &nfa.nodes[i].shifts;
                for key in [input, &Token::Any] {
                    if let Some(targets) = shifts.get(key) {
                        destination.extend(targets.iter().copied());
                    }
                }
            }
            let destination = epsilon_closure(nfa, destination);
            let id = calculate_dfa_id(nfa, &destination);
            let target = match by_id.get(&id) {
                Some(&t) => t,
                None => {
                    let t = states.len();
                    states.push(DfaState {
                        id: id.clone(),
                        actions: collect_dfa_actions(nfa, &destination),
                        shift: BTreeMap::new(),
                    });
                    by_id.insert(id, t);
                    queue.push_back((destination, t));
                    t
                }
            };
            states[index].shift.insert(input.clone(), target);
        }
    }

    let dfa = Dfa { states, entry: 0 };
    dfa.check_totality()?;
    Ok(dfa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{
        nfa::{NfaNode, NodeIdIssuer},
        tokens::ActionSpec,
    };

    fn build(actions: &[ActionSpec]) -> (Nfa, Dfa) {
        let nfa = Nfa::build(actions, &mut NodeIdIssuer::new());
        let dfa = nfa_to_dfa(&nfa).unwrap();
        (nfa, dfa)
    }

    #[test]
    fn closure_follows_only_epsilon_edges() {
        let actions = vec![ActionSpec::new("ab", [["a", "b"]])];
        let nfa = Nfa::build(&actions, &mut NodeIdIssuer::new());
        let closure = epsilon_closure(&nfa, NfaSet::from([nfa.start]));
        // search node + chain head, not the node after 'a'
        assert_eq!(closure.len(), 2);
        assert_eq!(calculate_dfa_id(&nfa, &closure), "0, 2");
    }

    #[test]
    fn dfa_id_sorts_numerically() {
        let node = |id| NfaNode {
            id,
            actions: None,
            shifts: BTreeMap::new(),
        };
        let nfa = Nfa {
            nodes: vec![node(10), node(2), node(1)],
            start: 0,
        };
        assert_eq!(calculate_dfa_id(&nfa, &NfaSet::from([0, 1, 2])), "1, 2, 10");
    }

    #[test]
    fn empty_action_list_gives_entry_with_self_loop() {
        let (_, dfa) = build(&[]);
        assert_eq!(dfa.states.len(), 1);
        assert_eq!(dfa.entry_state().shift.get(&Token::Any), Some(&dfa.entry));
        assert!(!dfa.entry_state().is_accepting());
    }

    #[test]
    fn overlapping_sequences_both_accept() {
        let (_, dfa) = build(&[
            ActionSpec::new("ab", [["a", "b"]]),
            ActionSpec::new("bab", [["b", "a", "b"]]),
        ]);
        let trace = dfa.trace(["a", "b", "a", "b"]).unwrap();
        assert_eq!(trace[1], vec!["ab"]);
        assert!(trace[2].is_empty());
        let mut last = trace[3].clone();
        last.sort();
        assert_eq!(last, vec!["ab", "bab"]);
    }

    #[test]
    fn no_duplicate_states_for_one_closure() {
        let (_, dfa) = build(&[
            ActionSpec::new("x", [["a", "a", "a"]]),
            ActionSpec::new("y", [["a", "b"]]),
        ]);
        let mut ids: Vec<_> = dfa.states.iter().map(|s| s.id.clone()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn duplicate_names_merge_on_one_state() {
        let (_, dfa) = build(&[
            ActionSpec::new("same", [["a"]]),
            ActionSpec::new("same", [["a"]]).immediate(),
        ]);
        let trace = dfa.trace(["a"]).unwrap();
        assert_eq!(trace[0], vec!["same"]);
    }

    #[test]
    fn missing_wildcard_is_a_construction_error() {
        let mut issuer = NodeIdIssuer::new();
        let mut nfa = Nfa::build(&[ActionSpec::new("a", [["a"]])], &mut issuer);
        let start = nfa.start;
        nfa.nodes[start].shifts.remove(&Token::Any);
        let err = nfa_to_dfa(&nfa).unwrap_err();
        assert!(err.to_string().contains("no ANY transition"), "{err}");
    }

    #[test]
    fn step_without_fallback_fails() {
        let dfa = Dfa {
            states: vec![DfaState {
                id: "only".into(),
                actions: None,
                shift: BTreeMap::from([(Token::literal("a"), 0)]),
            }],
            entry: 0,
        };
        assert_eq!(dfa.step(0, "a").unwrap(), 0);
        assert!(dfa.step(0, "b").is_err());
    }
}
