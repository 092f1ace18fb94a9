// src/lib.rs
//! Detects fixed token sequences ("secret codes") in a live token stream.
//!
//! The action list is compiled once into a minimal DFA (see [`automaton`]);
//! a [`Matcher`] then walks that DFA one token at a time and reports
//! completed sequences through callbacks.

pub mod automaton;
pub mod matcher;

pub use automaton::{ActionSpec, ConfirmMode, Dfa, Token};
pub use matcher::{AutomatonSource, Config, ConfigUpdate, Matcher, Options, ResetReason};
