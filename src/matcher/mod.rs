// src/matcher/mod.rs
//! Streaming matcher: one live position in a compiled automaton, moved by
//! `feed`, pulled back to the entry by timers.

pub mod config;
pub mod timer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::Result;
use rand::Rng;

pub use config::{
    ActionCallback, Config, ConfigUpdate, Options, ResetCallback, ResetReason, StateChangeCallback,
};
use timer::PendingTimers;

use crate::automaton::{Dfa, build_automaton, dump_snapshot, load_snapshot_json, visualize_dfa};

/// Where the compiled automaton comes from.
pub enum AutomatonSource<'a> {
    Actions(&'a [crate::automaton::ActionSpec]),
    Snapshot(&'a str),
}

impl AutomatonSource<'_> {
    pub fn compile(&self) -> Result<Dfa> {
        match self {
            AutomatonSource::Actions(actions) => build_automaton(actions),
            AutomatonSource::Snapshot(json) => load_snapshot_json(json),
        }
    }
}

struct Inner {
    dfa: Arc<Dfa>,
    current: usize,
    options: Options,
    on_action: ActionCallback,
    timers: PendingTimers,
}

/// Callback invocations decided under the lock and run after it is released.
enum Notice {
    StateChange(String, String),
    Reset(ResetReason),
    Action(Vec<String>),
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fresh_id() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}

struct Dispatch {
    on_action: ActionCallback,
    on_state_change: Option<StateChangeCallback>,
    on_reset: Option<ResetCallback>,
}

impl Dispatch {
    fn of(inner: &Inner) -> Self {
        Self {
            on_action: inner.on_action.clone(),
            on_state_change: inner.options.on_state_change.clone(),
            on_reset: inner.options.on_reset.clone(),
        }
    }

    fn run(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::StateChange(from, to) => {
                    if let Some(f) = &self.on_state_change {
                        f(&from, &to);
                    }
                }
                Notice::Reset(reason) => {
                    log::debug!("[matcher] reset: {reason}");
                    if let Some(f) = &self.on_reset {
                        f(reason);
                    }
                }
                Notice::Action(names) => {
                    let id = fresh_id();
                    log::debug!("[matcher] action {id}: {names:?}");
                    (self.on_action)(&id, &names);
                }
            }
        }
    }
}

pub struct Matcher {
    inner: Arc<Mutex<Inner>>,
}

impl Matcher {
    pub fn build(
        source: AutomatonSource<'_>,
        on_action: impl Fn(&str, &[String]) + Send + Sync + 'static,
        options: Options,
    ) -> Result<Matcher> {
        let dfa = source.compile()?;
        Ok(Self::with_automaton(Arc::new(dfa), on_action, options))
    }

    /// Builds a matcher over an already compiled automaton, which may be
    /// shared with other matchers.
    pub fn with_automaton(
        dfa: Arc<Dfa>,
        on_action: impl Fn(&str, &[String]) + Send + Sync + 'static,
        options: Options,
    ) -> Matcher {
        options.config.validate();
        let current = dfa.entry;
        Matcher {
            inner: Arc::new(Mutex::new(Inner {
                dfa,
                current,
                options,
                on_action: Arc::new(on_action),
                timers: PendingTimers::default(),
            })),
        }
    }

    pub fn automaton(&self) -> Arc<Dfa> {
        lock(&self.inner).dfa.clone()
    }

    pub fn config_snapshot(&self) -> Config {
        lock(&self.inner).options.config
    }

    pub fn current_state_id(&self) -> String {
        let inner = lock(&self.inner);
        inner.dfa.states[inner.current].id.clone()
    }

    pub fn is_at_entry(&self) -> bool {
        let inner = lock(&self.inner);
        inner.current == inner.dfa.entry
    }

    /// Applies only the fields present in `update`.
    pub fn config(&self, update: ConfigUpdate) {
        if update.is_empty() {
            return;
        }
        let mut inner = lock(&self.inner);
        update.apply(&mut inner.options);
        inner.options.config.validate();
    }

    pub fn dump(&self) -> Result<String> {
        dump_snapshot(&self.automaton()).to_json()
    }

    pub fn visualize(&self) -> String {
        visualize_dfa(&self.automaton())
    }

    /// Consumes one token. Timers armed by earlier calls are cancelled first.
    ///
    /// Timers are Tokio tasks, so this must run inside a Tokio runtime
    /// whenever the token leaves the entry or completes a deferred action.
    /// On error the matcher is left exactly as it was.
    pub fn feed(&self, token: &str) -> Result<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut notices = Vec::new();
        let dispatch;
        {
            let mut guard = lock(&self.inner);
            let inner = &mut *guard;

            let source = inner.current;
            let target = inner.dfa.step(source, token)?;
            let entry = inner.dfa.entry;
            let config = inner.options.config;

            let (immediate, deferred): (Vec<_>, Vec<_>) = inner.dfa.states[target]
                .actions
                .iter()
                .flatten()
                .partition(|a| a.immediate_confirm);
            let resting = if !immediate.is_empty() && config.reset_on_action {
                entry
            } else {
                target
            };
            if !deferred.is_empty() || resting != entry {
                timer::require_runtime()?;
            }

            let epoch = inner.timers.cancel_all();
            log::trace!(
                "[matcher] {:?} --{token}--> {:?}",
                inner.dfa.states[source].id,
                inner.dfa.states[target].id
            );
            notices.push(Notice::StateChange(
                inner.dfa.states[source].id.clone(),
                inner.dfa.states[target].id.clone(),
            ));
            if target == entry {
                notices.push(Notice::Reset(ResetReason::NormalProceed));
            }
            if !immediate.is_empty() {
                notices.push(Notice::Action(
                    immediate.iter().map(|a| a.name.clone()).collect(),
                ));
                if config.reset_on_action {
                    notices.push(Notice::Reset(ResetReason::Confirmed));
                }
            }
            let deferred: Vec<String> = deferred.iter().map(|a| a.name.clone()).collect();
            inner.current = resting;

            if !deferred.is_empty() {
                let weak = weak.clone();
                inner
                    .timers
                    .schedule(config.confirm_timeout(), move |armed| {
                        fire_confirm(&weak, armed, deferred)
                    })?;
            }
            if resting != entry {
                inner
                    .timers
                    .schedule(config.sequence_timeout(), move |armed| {
                        fire_timeout(&weak, armed)
                    })?;
            }
            debug_assert_eq!(epoch, inner.timers.epoch());
            dispatch = Dispatch::of(inner);
        }
        dispatch.run(notices);
        Ok(())
    }
}

fn fire_confirm(weak: &Weak<Mutex<Inner>>, armed: u64, names: Vec<String>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut notices = vec![Notice::Action(names)];
    let dispatch = {
        let mut guard = lock(&inner);
        if guard.timers.epoch() != armed {
            return;
        }
        if guard.options.config.reset_on_action {
            guard.current = guard.dfa.entry;
            notices.push(Notice::Reset(ResetReason::Confirmed));
        }
        Dispatch::of(&guard)
    };
    dispatch.run(notices);
}

fn fire_timeout(weak: &Weak<Mutex<Inner>>, armed: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let dispatch = {
        let mut guard = lock(&inner);
        if guard.timers.epoch() != armed {
            return;
        }
        guard.current = guard.dfa.entry;
        Dispatch::of(&guard)
    };
    dispatch.run(vec![Notice::Reset(ResetReason::Timeout)]);
}
