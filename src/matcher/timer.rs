// src/matcher/timer.rs
//! Cancellable delayed callbacks on the ambient Tokio runtime.

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::{runtime::Handle, task::JoinHandle};

/// Timers armed since the last `cancel_all`.
///
/// Every armed callback is tagged with the epoch it was armed in. The owner
/// must compare that tag with `epoch()` under its own lock before acting: an
/// aborted task may already be past its `sleep`, and the epoch is what makes
/// cancellation stick.
#[derive(Debug, Default)]
pub struct PendingTimers {
    epoch: u64,
    handles: Vec<JoinHandle<()>>,
}

/// The runtime timers are spawned on, or an error outside of one.
pub fn require_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| anyhow!("arming a timer requires a Tokio runtime: {e}"))
}

impl PendingTimers {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aborts everything and starts a new epoch, which is returned.
    pub fn cancel_all(&mut self) -> u64 {
        for h in self.handles.drain(..) {
            h.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    /// Runs `f(epoch)` after `delay` on the current Tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, f: F) -> Result<()>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let runtime = require_runtime()?;
        let epoch = self.epoch;
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            f(epoch);
        }));
        Ok(())
    }
}

impl Drop for PendingTimers {
    fn drop(&mut self) {
        for h in &self.handles {
            h.abort();
        }
    }
}
