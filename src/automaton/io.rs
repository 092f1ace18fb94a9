// src/automaton/io.rs
use std::{
    collections::{BTreeMap, VecDeque},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::{
    dfa::{Dfa, DfaState},
    tokens::{ActionRecord, Token},
};

// -------------------- snapshot layout --------------------

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    #[serde(default)]
    pub actions: Option<Vec<ActionRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub token: Token,
    pub source: String,
    pub destination: String,
}

/// Flat, restorable form of a compiled automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<SnapshotNode>,
    pub shift: Vec<SnapshotEdge>,
    pub entry: String,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode snapshot JSON")
    }
}

/// Breadth-first from the entry; only reachable states are emitted.
pub fn dump_snapshot(dfa: &Dfa) -> Snapshot {
    let mut nodes = Vec::new();
    let mut shift = Vec::new();
    let mut seen = vec![false; dfa.states.len()];
    let mut queue = VecDeque::from([dfa.entry]);
    seen[dfa.entry] = true;

    while let Some(s) = queue.pop_front() {
        let state = &dfa.states[s];
        nodes.push(SnapshotNode {
            id: state.id.clone(),
            actions: state.actions.clone(),
        });
        for (token, &target) in &state.shift {
            shift.push(SnapshotEdge {
                token: token.clone(),
                source: state.id.clone(),
                destination: dfa.states[target].id.clone(),
            });
            if !seen[target] {
                seen[target] = true;
                queue.push_back(target);
            }
        }
    }

    Snapshot {
        nodes,
        shift,
        entry: dfa.entry_state().id.clone(),
    }
}

pub fn load_snapshot(snapshot: Snapshot) -> Result<Dfa> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(snapshot.nodes.len());
    let mut states = Vec::with_capacity(snapshot.nodes.len());
    for node in snapshot.nodes {
        if index.insert(node.id.clone(), states.len()).is_some() {
            bail!("malformed snapshot: duplicate node id {:?}", node.id);
        }
        states.push(DfaState {
            id: node.id,
            actions: node.actions,
            shift: BTreeMap::new(),
        });
    }

    let lookup = |id: &str, role: &str| {
        index
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("malformed snapshot: edge {role} {id:?} is not a known node"))
    };
    for edge in snapshot.shift {
        if edge.token == Token::Epsilon {
            bail!(
                "malformed snapshot: epsilon edge {:?} -> {:?}",
                edge.source,
                edge.destination
            );
        }
        let source = lookup(&edge.source, "source")?;
        let destination = lookup(&edge.destination, "destination")?;
        if states[source].shift.contains_key(&edge.token) {
            bail!(
                "malformed snapshot: duplicate edge from {:?} on {}",
                edge.source,
                edge.token
            );
        }
        states[source].shift.insert(edge.token, destination);
    }

    let entry = *index
        .get(&snapshot.entry)
        .ok_or_else(|| anyhow!("malformed snapshot: entry {:?} is not a known node", snapshot.entry))?;
    Ok(Dfa { states, entry })
}

// -------------------- JSON helpers --------------------

pub fn load_snapshot_json(data: &str) -> Result<Dfa> {
    let snapshot: Snapshot =
        serde_json::from_str(data).context("failed to parse snapshot JSON")?;
    load_snapshot(snapshot)
}

pub fn load_snapshot_json_bytes(data: &[u8]) -> Result<Dfa> {
    let snapshot: Snapshot =
        serde_json::from_slice(data).context("failed to parse snapshot JSON")?;
    load_snapshot(snapshot)
}

pub fn save_snapshot_json(path: &Path, dfa: &Dfa) -> std::io::Result<()> {
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, &dump_snapshot(dfa))?;
    w.flush()
}
