// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background status reconciliation on a timer: spawn a task, tick on an
//! interval, and guarantee one final pass after a stop signal so no
//! observer sees a stale status past shutdown.

use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default tick period: well under the ceiling allowed between a job
/// reaching an absorbing status and the registry's copy catching up.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Periodically calls [`Registry::update_all`] on a background task.
pub struct Monitor {
    stop: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Spawn a monitor ticking every `tick` against `registry`.
    pub fn spawn(registry: Arc<Registry>, tick: Duration) -> Self {
        let stop = Arc::new(Notify::new());
        let task_stop = stop.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The first tick fires immediately; skip it so callers don't
            // pay for a redundant update_all() before any job has run.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => registry.update_all(),
                    _ = task_stop.notified() => {
                        registry.update_all();
                        break;
                    }
                }
            }
        });
        Self { stop, handle: Some(handle) }
    }

    /// Spawn with [`DEFAULT_TICK`].
    pub fn spawn_default(registry: Arc<Registry>) -> Self {
        Self::spawn(registry, DEFAULT_TICK)
    }

    /// Signal the background task to run one last `update_all()` and stop,
    /// then wait for it to finish.
    pub async fn stop(mut self) {
        self.stop.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
