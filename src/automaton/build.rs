// src/automaton/build.rs
use std::time::Instant;

use anyhow::{Context, Result};

use super::{
    dfa::{Dfa, nfa_to_dfa},
    minimize::minimize_dfa,
    nfa::{Nfa, NodeIdIssuer},
    tokens::ActionSpec,
};

/// Intermediate products of one compilation, kept for debugging output.
pub struct Compiled {
    pub nfa: Nfa,
    pub raw: Dfa,
    pub dfa: Dfa,
}

pub fn compile(actions: &[ActionSpec], issuer: &mut NodeIdIssuer) -> Result<Compiled> {
    let t0 = Instant::now();
    let nfa = Nfa::build(actions, issuer);

    let t1 = Instant::now();
    let raw = nfa_to_dfa(&nfa).context("subset construction failed")?;
    log::debug!(
        "[automaton] subset construction: {} nfa nodes -> {} states ({} us)",
        nfa.nodes.len(),
        raw.states.len(),
        t1.elapsed().as_micros()
    );

    let t2 = Instant::now();
    let dfa = minimize_dfa(&raw).context("minimization failed")?;
    log::debug!(
        "[automaton] minimized: {} -> {} states ({} us), total {} us",
        raw.states.len(),
        dfa.states.len(),
        t2.elapsed().as_micros(),
        t0.elapsed().as_micros()
    );

    Ok(Compiled { nfa, raw, dfa })
}

/// NFA -> DFA -> minimal DFA with a fresh id issuer. The NFA is dropped here.
pub fn build_automaton(actions: &[ActionSpec]) -> Result<Dfa> {
    compile(actions, &mut NodeIdIssuer::new()).map(|c| c.dfa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_keeps_every_stage() {
        let c = compile(
            &[ActionSpec::new("jump", [["Up", "Up"]]).immediate()],
            &mut NodeIdIssuer::new(),
        )
        .unwrap();
        assert_eq!(c.nfa.nodes.len(), 4);
        assert_eq!(c.raw.states.len(), 3);
        assert_eq!(c.dfa.states.len(), 3);
        assert_eq!(c.dfa.trace(["Up", "Up"]).unwrap()[1], vec!["jump"]);
    }
}
