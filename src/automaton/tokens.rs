// src/automaton/tokens.rs
use core::fmt;

use serde::{Deserialize, Serialize};

/// One input symbol on an automaton edge.
///
/// `Epsilon` only ever appears on NFA edges. `Any` is the wildcard: it is taken
/// for every literal that has no explicit edge at that state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Literal(String),
    Epsilon,
    Any,
}

impl Token {
    pub fn literal(s: impl Into<String>) -> Self {
        Token::Literal(s.into())
    }

    /// Edge label used by the DOT renderer.
    pub fn label(&self) -> &str {
        match self {
            Token::Literal(s) => s,
            Token::Epsilon => "ε",
            Token::Any => "ANY",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmMode {
    /// Fire after the confirm delay, unless another token arrives first.
    #[default]
    Default,
    /// Fire synchronously inside `feed`.
    Immediate,
}

/// Compile-time description of one named action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub sequences: Vec<Vec<String>>,
    #[serde(default)]
    pub confirm: ConfirmMode,
}

impl ActionSpec {
    pub fn new<S, T>(name: impl Into<String>, sequences: impl IntoIterator<Item = S>) -> Self
    where
        S: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            sequences: sequences
                .into_iter()
                .map(|seq| seq.into_iter().map(Into::into).collect())
                .collect(),
            confirm: ConfirmMode::Default,
        }
    }

    pub fn immediate(mut self) -> Self {
        self.confirm = ConfirmMode::Immediate;
        self
    }
}

/// An action attached to an accepting automaton state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub name: String,
    pub immediate_confirm: bool,
}

impl From<&ActionSpec> for ActionRecord {
    fn from(spec: &ActionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            immediate_confirm: spec.confirm == ConfirmMode::Immediate,
        }
    }
}

/// Appends `incoming` to `into`, skipping names already present.
pub(crate) fn merge_actions<'a>(
    into: &mut Vec<ActionRecord>,
    incoming: impl IntoIterator<Item = &'a ActionRecord>,
) {
    for action in incoming {
        if !into.iter().any(|a| a.name == action.name) {
            into.push(action.clone());
        }
    }
}
