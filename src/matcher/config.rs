// src/matcher/config.rs
use core::fmt;
use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

pub const ENV_SEQUENCE_TIMEOUT: &str = "SWEETPRESS_SEQUENCE_TIMEOUT_MS";
pub const ENV_CONFIRM_TIMEOUT: &str = "SWEETPRESS_CONFIRM_TIMEOUT_MS";
pub const ENV_RESET_ON_ACTION: &str = "SWEETPRESS_RESET_ON_ACTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// The token led straight back to the entry.
    NormalProceed,
    /// No token arrived within the sequence timeout.
    Timeout,
    /// An action fired with `reset_on_action` enabled.
    Confirmed,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResetReason::NormalProceed => "normal proceed",
            ResetReason::Timeout => "timeout",
            ResetReason::Confirmed => "confirmed",
        })
    }
}

/// `(id, action names)`; the id is fresh for every invocation.
pub type ActionCallback = Arc<dyn Fn(&str, &[String]) + Send + Sync>;
/// `(source state id, destination state id)`.
pub type StateChangeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;
pub type ResetCallback = Arc<dyn Fn(ResetReason) + Send + Sync>;

/// Plain-data settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Allowed gap between two tokens before progress is dropped.
    pub sequence_timeout_ms: u64,
    /// Delay before a default-confirm action fires. Should be below
    /// `sequence_timeout_ms`.
    pub confirm_timeout_ms: u64,
    /// Jump back to the entry once an action fires. With `abc -> A` and
    /// `bca -> B`, input `abca` yields only A when set.
    pub reset_on_action: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sequence_timeout_ms: 100,
            confirm_timeout_ms: 50,
            reset_on_action: false,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

impl Config {
    pub fn sequence_timeout(&self) -> Duration {
        Duration::from_millis(self.sequence_timeout_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    /// Overlays the `SWEETPRESS_*` environment variables; values that do not
    /// parse are ignored.
    pub fn from_env(base: Config) -> Config {
        Config {
            sequence_timeout_ms: env_u64(ENV_SEQUENCE_TIMEOUT).unwrap_or(base.sequence_timeout_ms),
            confirm_timeout_ms: env_u64(ENV_CONFIRM_TIMEOUT).unwrap_or(base.confirm_timeout_ms),
            reset_on_action: env_bool(ENV_RESET_ON_ACTION).unwrap_or(base.reset_on_action),
        }
    }

    pub fn validate(&self) {
        if self.confirm_timeout_ms >= self.sequence_timeout_ms {
            log::warn!(
                "confirm_timeout ({} ms) is not below sequence_timeout ({} ms); deferred actions race the reset",
                self.confirm_timeout_ms,
                self.sequence_timeout_ms
            );
        }
    }
}

/// Everything `Matcher::build` accepts besides the automaton and the action
/// callback.
#[derive(Clone, Default)]
pub struct Options {
    pub config: Config,
    pub on_state_change: Option<StateChangeCallback>,
    pub on_reset: Option<ResetCallback>,
}

impl Options {
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn on_state_change(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    pub fn on_reset(mut self, f: impl Fn(ResetReason) + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Arc::new(f));
        self
    }
}

/// Partial update: `None` leaves the current value alone.
#[derive(Clone, Default)]
pub struct ConfigUpdate {
    pub sequence_timeout_ms: Option<u64>,
    pub confirm_timeout_ms: Option<u64>,
    pub reset_on_action: Option<bool>,
    pub on_state_change: Option<StateChangeCallback>,
    pub on_reset: Option<ResetCallback>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.sequence_timeout_ms.is_none()
            && self.confirm_timeout_ms.is_none()
            && self.reset_on_action.is_none()
            && self.on_state_change.is_none()
            && self.on_reset.is_none()
    }

    pub(crate) fn apply(self, options: &mut Options) {
        if let Some(v) = self.sequence_timeout_ms {
            options.config.sequence_timeout_ms = v;
        }
        if let Some(v) = self.confirm_timeout_ms {
            options.config.confirm_timeout_ms = v;
        }
        if let Some(v) = self.reset_on_action {
            options.config.reset_on_action = v;
        }
        if let Some(f) = self.on_state_change {
            options.on_state_change = Some(f);
        }
        if let Some(f) = self.on_reset {
            options.on_reset = Some(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.sequence_timeout_ms, 100);
        assert_eq!(c.confirm_timeout_ms, 50);
        assert!(!c.reset_on_action);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let c: Config = serde_json::from_str(r#"{"reset_on_action":true}"#).unwrap();
        assert_eq!(c.sequence_timeout_ms, 100);
        assert!(c.reset_on_action);
    }

    #[test]
    fn update_touches_only_supplied_fields() {
        let mut options = Options::default().on_reset(|_| {});
        ConfigUpdate {
            confirm_timeout_ms: Some(10),
            ..Default::default()
        }
        .apply(&mut options);
        assert_eq!(options.config.confirm_timeout_ms, 10);
        assert_eq!(options.config.sequence_timeout_ms, 100);
        assert!(options.on_reset.is_some());
        assert!(options.on_state_change.is_none());
    }

    #[test]
    fn reset_reason_display() {
        assert_eq!(ResetReason::NormalProceed.to_string(), "normal proceed");
        assert_eq!(ResetReason::Timeout.to_string(), "timeout");
        assert_eq!(ResetReason::Confirmed.to_string(), "confirmed");
    }
}
