// src/bin/gen_automaton.rs
// Compile an action list once and write the snapshot JSON.
// Usage:
//   cargo run --bin gen_automaton -- actions.json                 # writes automaton/snapshot.json
//   cargo run --bin gen_automaton -- actions.json out.json --dot dfa.dot --nfa-dot nfa.dot
//
// actions.json: [{"name": "jump", "sequences": [["Up", "Up"]], "confirm": "immediate"}, ...]

use std::{env, fs, path::Path};

use anyhow::{Context, Result, bail};
use sweetpress::automaton::{
    ActionSpec, NodeIdIssuer, compile, save_snapshot_json, visualize_dfa, visualize_nfa,
};

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Ok(())
}

fn write_with_parent(path: &Path, contents: &str) -> Result<()> {
    create_parent(path)?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn main() -> Result<()> {
    let mut positional = Vec::new();
    let mut dot_out = None;
    let mut nfa_dot_out = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dot" => dot_out = Some(args.next().context("--dot needs a path")?),
            "--nfa-dot" => nfa_dot_out = Some(args.next().context("--nfa-dot needs a path")?),
            _ => positional.push(arg),
        }
    }
    let Some(input) = positional.first() else {
        bail!("usage: gen_automaton <actions.json> [out.json] [--dot path] [--nfa-dot path]");
    };
    let out = positional
        .get(1)
        .cloned()
        .unwrap_or_else(|| "automaton/snapshot.json".to_string());
    let out_path = Path::new(&out);

    let data = fs::read(input).with_context(|| format!("read {input}"))?;
    let actions: Vec<ActionSpec> =
        serde_json::from_slice(&data).with_context(|| format!("parse action list {input}"))?;

    println!("[gen_automaton] compiling {} actions…", actions.len());
    let compiled = compile(&actions, &mut NodeIdIssuer::new())?;
    let accepting = compiled.dfa.states.iter().filter(|s| s.is_accepting()).count();
    println!(
        "[gen_automaton] nfa = {} nodes, dfa = {} states, minimized = {} states ({} accepting)",
        compiled.nfa.nodes.len(),
        compiled.raw.states.len(),
        compiled.dfa.states.len(),
        accepting
    );

    create_parent(out_path)?;
    save_snapshot_json(out_path, &compiled.dfa)
        .with_context(|| format!("write {}", out_path.display()))?;
    println!("[gen_automaton] wrote {}", out_path.display());

    if let Some(p) = dot_out {
        write_with_parent(Path::new(&p), &visualize_dfa(&compiled.dfa))?;
        println!("[gen_automaton] wrote {p}");
    }
    if let Some(p) = nfa_dot_out {
        write_with_parent(Path::new(&p), &visualize_nfa(&compiled.nfa))?;
        println!("[gen_automaton] wrote {p}");
    }
    Ok(())
}
