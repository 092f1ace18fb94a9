// src/automaton/mod.rs
pub mod build;
pub mod dfa;
pub mod dot;
pub mod io;
pub mod minimize;
pub mod nfa;
pub mod tokens;

pub use build::{Compiled, build_automaton, compile};
pub use dfa::{Dfa, DfaState};
pub use dot::{visualize_dfa, visualize_nfa};
pub use io::{
    Snapshot, dump_snapshot, load_snapshot, load_snapshot_json, load_snapshot_json_bytes,
    save_snapshot_json,
};
pub use nfa::{Nfa, NodeIdIssuer};
pub use tokens::{ActionRecord, ActionSpec, ConfirmMode, Token};
