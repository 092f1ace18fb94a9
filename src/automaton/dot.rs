// src/automaton/dot.rs
// Graphviz renderings of the automata, for debugging only.

use std::collections::VecDeque;

use super::{dfa::Dfa, nfa::Nfa, tokens::ActionRecord};

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_line(id: &str, actions: Option<&Vec<ActionRecord>>) -> String {
    let mut label = escape(id);
    for a in actions.into_iter().flatten() {
        label.push_str("\\n");
        label.push_str(&escape(&a.name));
    }
    let shape = if actions.is_some() { " shape=doublecircle" } else { "" };
    format!("  \"{}\" [label=\"{label}\"{shape}];", escape(id))
}

fn edge_line(from: &str, to: &str, label: &str) -> String {
    format!(
        "  \"{}\" -> \"{}\" [label=\"{}\"];",
        escape(from),
        escape(to),
        escape(label)
    )
}

fn finish(lines: Vec<String>) -> String {
    format!(
        "digraph Automaton {{
  rankdir=LR;
  overlap=false;
  splines=true;
  node [shape=circle, fixedsize=false];
  edge [arrowsize=0.4, penwidth=0.8];

  start [shape=point, width=0.1];

{}
}}
",
        lines.join("\n")
    )
}

pub fn visualize_nfa(nfa: &Nfa) -> String {
    let start_id = nfa.nodes[nfa.start].id.to_string();
    let mut lines = vec![format!("  start -> \"{start_id}\";")];
    let mut seen = vec![false; nfa.nodes.len()];
    let mut queue = VecDeque::from([nfa.start]);
    seen[nfa.start] = true;
    while let Some(i) = queue.pop_front() {
        let node = &nfa.nodes[i];
        let id = node.id.to_string();
        lines.push(node_line(&id, node.actions.as_ref()));
        for (token, targets) in &node.shifts {
            for &t in targets {
                lines.push(edge_line(&id, &nfa.nodes[t].id.to_string(), token.label()));
                if !seen[t] {
                    seen[t] = true;
                    queue.push_back(t);
                }
            }
        }
    }
    finish(lines)
}

pub fn visualize_dfa(dfa: &Dfa) -> String {
    let mut lines = vec![format!("  start -> \"{}\";", escape(&dfa.entry_state().id))];
    for s in dfa.reachable() {
        let state = &dfa.states[s];
        lines.push(node_line(&state.id, state.actions.as_ref()));
        for (token, &t) in &state.shift {
            lines.push(edge_line(&state.id, &dfa.states[t].id, token.label()));
        }
    }
    finish(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{
        build::compile,
        nfa::NodeIdIssuer,
        tokens::ActionSpec,
    };

    #[test]
    fn dfa_output_marks_accepting_states() {
        let c = compile(&[ActionSpec::new("jump", [["Up", "Up"]])], &mut NodeIdIssuer::new()).unwrap();
        let dot = visualize_dfa(&c.dfa);
        assert!(dot.starts_with("digraph Automaton {"));
        assert!(dot.contains("start [shape=point, width=0.1];"));
        assert!(dot.contains("start -> \"entry\";"));
        assert!(dot.contains("\\njump\" shape=doublecircle];"));
        assert!(dot.contains("[label=\"ANY\"]"));
        assert!(dot.contains("[label=\"Up\"]"));
        assert!(!dot.contains("ε"));
    }

    #[test]
    fn nfa_output_shows_epsilon_edges() {
        let c = compile(&[ActionSpec::new("a", [["a"]])], &mut NodeIdIssuer::new()).unwrap();
        let dot = visualize_nfa(&c.nfa);
        assert!(dot.contains("start -> \"0\";"));
        assert!(dot.contains("\"0\" -> \"2\" [label=\"ε\"];"));
        assert!(dot.contains("\"0\" -> \"0\" [label=\"ANY\"];"));
        assert!(dot.contains("\"2\" -> \"1\" [label=\"a\"];"));
    }

    #[test]
    fn quotes_in_tokens_are_escaped() {
        let c = compile(&[ActionSpec::new("q", [["\""]])], &mut NodeIdIssuer::new()).unwrap();
        assert!(visualize_dfa(&c.dfa).contains("[label=\"\\\"\"]"));
    }
}
