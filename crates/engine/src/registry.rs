// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks every constructed job (pipeline or bare stage) so the process can
//! assign ids, poll statuses, and tear everything down together.

use pipeworks_core::Status;
use std::sync::{Arc, LazyLock};

/// A trackable job: a [`crate::pipeline::Pipeline`] or a standalone
/// [`crate::stage::Stage`].
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Last status reconciled by [`Job::update_status`].
    fn status(&self) -> Status;

    /// Reconcile status from the job's internal flags without blocking.
    fn update_status(&self);

    /// Set the kill flag without waiting for the job to stop. Non-blocking.
    fn signal_kill(&self);

    /// Set the kill flag and wait for the job to stop.
    async fn kill(&self) {
        self.signal_kill();
        self.wait().await;
    }

    /// Block until the job has reached an absorbing status.
    async fn wait(&self);
}

/// The set of jobs constructed against a given registry, keyed by a
/// monotonically increasing `jid`.
pub struct Registry {
    jobs: parking_lot::Mutex<Vec<(u64, Arc<dyn Job>)>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { jobs: parking_lot::Mutex::new(Vec::new()) }
    }

    /// `max(existing jid) + 1`, or `0` if the registry is empty. Gaps are
    /// permitted: nothing reclaims an id once assigned.
    ///
    /// Reading this and later calling [`Registry::register`] is two steps
    /// rather than one atomic reservation, matching the original's
    /// `max(registry.keys()) + 1` — construction is expected to run from a
    /// single task; concurrent `Pipeline::construct` calls racing against
    /// the same registry are not supported.
    pub fn next_jid(&self) -> u64 {
        self.jobs.lock().iter().map(|(jid, _)| jid + 1).max().unwrap_or(0)
    }

    /// Record a job under `jid`.
    pub fn register(&self, jid: u64, job: Arc<dyn Job>) {
        self.jobs.lock().push((jid, job));
    }

    /// Number of jobs ever registered (terminated jobs are not removed).
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// A snapshot of every registered job, oldest first.
    pub fn jobs(&self) -> Vec<Arc<dyn Job>> {
        self.jobs.lock().iter().map(|(_, job)| job.clone()).collect()
    }

    /// Reconcile status on every registered job. Cheap and non-blocking;
    /// intended to be called by [`crate::monitor::Monitor`] on a timer.
    pub fn update_all(&self) {
        for (_, job) in self.jobs.lock().iter() {
            job.update_status();
        }
    }

    /// Kill and wait for every registered job. Idempotent: jobs already
    /// terminated or killed accept a redundant kill as a no-op wait.
    ///
    /// Signals every job before waiting on any of them, so their teardowns
    /// run concurrently in the background instead of one after another.
    pub async fn shutdown(&self) {
        let jobs = self.jobs();
        for job in &jobs {
            job.signal_kill();
        }
        for job in &jobs {
            job.wait().await;
        }
    }

    /// Wait for every registered job without killing any of them.
    pub async fn wait_all(&self) {
        for job in self.jobs() {
            job.wait().await;
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide default registry, for callers that don't want to thread
/// one through explicitly.
pub fn default_registry() -> &'static Registry {
    static DEFAULT: LazyLock<Registry> = LazyLock::new(Registry::new);
    &DEFAULT
}
