// src/main.rs
use std::time::Duration;

use sweetpress::{ActionSpec, AutomatonSource, Config, Matcher, Options};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let actions = vec![
        ActionSpec::new(
            "konami",
            [[
                "Up", "Up", "Down", "Down", "Left", "Right", "Left", "Right", "b", "a",
            ]],
        ),
        ActionSpec::new("jump", [["Up", "Up"]]).immediate(),
        ActionSpec::new("dash", [vec!["Right", "Right"], vec!["l", "l"]]),
    ];

    let config = Config::from_env(Config {
        sequence_timeout_ms: 500,
        confirm_timeout_ms: 200,
        reset_on_action: false,
    });
    let options = Options::default()
        .with_config(config)
        .on_reset(|reason| println!("  reset: {reason}"));
    let matcher = Matcher::build(
        AutomatonSource::Actions(&actions),
        |id, names| println!("  ACTION {names:?} ({id})"),
        options,
    )?;

    // A short scripted session; the gaps are longer than the confirm delay
    // only where an action should be confirmed.
    let script: &[(&str, u64)] = &[
        ("Up", 10),
        ("Up", 10),
        ("Down", 10),
        ("Down", 10),
        ("Left", 10),
        ("Right", 10),
        ("Left", 10),
        ("Right", 10),
        ("b", 10),
        ("a", 300),
        ("Right", 10),
        ("Right", 700),
        ("x", 10),
    ];
    for &(token, pause_ms) in script {
        println!("feed {token:?}");
        matcher.feed(token)?;
        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
    }

    println!("automaton has {} states", matcher.automaton().states.len());
    Ok(())
}
