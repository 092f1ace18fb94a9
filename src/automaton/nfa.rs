// src/automaton/nfa.rs
use std::collections::BTreeMap;

use super::tokens::{ActionRecord, ActionSpec, Token};

/// Hands out NFA node ids. Scoped to whoever owns it, so independent builds
/// never share a counter.
#[derive(Debug, Default)]
pub struct NodeIdIssuer {
    next: u32,
}

impl NodeIdIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts issuing at `first` (useful when ids must not collide with an
    /// earlier build's ids).
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn issue(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct NfaNode {
    pub id: u32,
    pub actions: Option<Vec<ActionRecord>>,
    /// Token -> arena indices of the destination nodes.
    pub shifts: BTreeMap<Token, Vec<usize>>,
}

/// Node arena. `start` is the search node: `Any` self-loop plus one `Epsilon`
/// edge to the head of every sequence chain.
#[derive(Debug, Clone)]
pub struct Nfa {
    pub nodes: Vec<NfaNode>,
    pub start: usize,
}

impl Nfa {
    pub fn build(actions: &[ActionSpec], issuer: &mut NodeIdIssuer) -> Nfa {
        let mut nfa = Nfa {
            nodes: Vec::new(),
            start: 0,
        };
        let start = nfa.push(issuer, None);
        nfa.start = start;
        nfa.connect(start, Token::Any, start);

        for action in actions {
            let terminal = nfa.push(issuer, Some(vec![ActionRecord::from(action)]));
            for sequence in &action.sequences {
                if sequence.is_empty() {
                    log::warn!(
                        "[automaton] action {:?} has an empty sequence; it can never complete",
                        action.name
                    );
                    continue;
                }
                let head = nfa.build_chain(issuer, sequence, terminal);
                nfa.connect(start, Token::Epsilon, head);
            }
        }

        log::debug!(
            "[automaton] nfa: {} nodes for {} actions",
            nfa.nodes.len(),
            actions.len()
        );
        nfa
    }

    /// One fresh node per token except the last, whose edge lands on `terminal`.
    fn build_chain(&mut self, issuer: &mut NodeIdIssuer, sequence: &[String], terminal: usize) -> usize {
        let head = self.push(issuer, None);
        let mut current = head;
        for (index, input) in sequence.iter().enumerate() {
            let next = if index == sequence.len() - 1 {
                terminal
            } else {
                self.push(issuer, None)
            };
            self.connect(current, Token::literal(input.as_str()), next);
            current = next;
        }
        head
    }

    fn push(&mut self, issuer: &mut NodeIdIssuer, actions: Option<Vec<ActionRecord>>) -> usize {
        self.nodes.push(NfaNode {
            id: issuer.issue(),
            actions,
            shifts: BTreeMap::new(),
        });
        self.nodes.len() - 1
    }

    fn connect(&mut self, from: usize, token: Token, to: usize) {
        let targets = self.nodes[from].shifts.entry(token).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_node_loops_on_any_and_branches_on_epsilon() {
        let actions = vec![
            ActionSpec::new("ab", [["a", "b"]]),
            ActionSpec::new("c", [["c"]]),
        ];
        let nfa = Nfa::build(&actions, &mut NodeIdIssuer::new());
        let start = &nfa.nodes[nfa.start];
        assert_eq!(start.shifts[&Token::Any], vec![nfa.start]);
        assert_eq!(start.shifts[&Token::Epsilon].len(), 2);
        // start, ab terminal, ab chain (2), c terminal, c chain (1)
        assert_eq!(nfa.nodes.len(), 6);
    }

    #[test]
    fn sequences_of_one_action_share_the_terminal() {
        let actions = vec![ActionSpec::new("x", [vec!["a", "b"], vec!["c"]])];
        let nfa = Nfa::build(&actions, &mut NodeIdIssuer::new());
        let terminals: Vec<_> = nfa
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.actions.is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terminals.len(), 1);
        let incoming = nfa
            .nodes
            .iter()
            .flat_map(|n| n.shifts.values())
            .filter(|targets| targets.contains(&terminals[0]))
            .count();
        assert_eq!(incoming, 2);
    }

    #[test]
    fn issuer_is_scoped_per_build() {
        let actions = vec![ActionSpec::new("a", [["a"]])];
        let first = Nfa::build(&actions, &mut NodeIdIssuer::new());
        let second = Nfa::build(&actions, &mut NodeIdIssuer::new());
        let ids = |nfa: &Nfa| nfa.nodes.iter().map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));

        let offset = Nfa::build(&actions, &mut NodeIdIssuer::starting_at(100));
        assert_eq!(offset.nodes[offset.start].id, 100);
    }

    #[test]
    fn empty_sequences_are_skipped() {
        let actions = vec![ActionSpec::new("none", [Vec::<String>::new()])];
        let nfa = Nfa::build(&actions, &mut NodeIdIssuer::new());
        assert!(!nfa.nodes[nfa.start].shifts.contains_key(&Token::Epsilon));
    }
}
