// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A sequence of stages sharing one kill flag and one working directory.

use crate::registry::Registry;
use crate::stage::{DataBuilder, Stage};
use crate::workspace::allocate_subdir_named;
use pipeworks_core::{PipelineError, Status};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// An ordered chain of [`Stage`]s, wired mailbox-to-mailbox, sharing one
/// kill flag so a kill or a failure in any stage stops the whole chain.
pub struct Pipeline {
    jid: u64,
    root_dir: PathBuf,
    kill_flag: Arc<AtomicBool>,
    stages: AsyncMutex<Vec<Stage>>,
    status: parking_lot::Mutex<Status>,
}

impl Pipeline {
    /// Register a new, empty pipeline against `registry` (or the
    /// process-wide default, if `None`) and allocate its working directory
    /// as `root/{jid}`.
    pub async fn construct(
        root: impl AsRef<Path>,
        registry: Option<&Registry>,
    ) -> Result<Arc<Self>, PipelineError> {
        let registry = match registry {
            Some(registry) => registry,
            None => crate::registry::default_registry(),
        };
        let jid = registry.next_jid();
        let root_dir = allocate_subdir_named(root.as_ref(), jid).await?;
        let pipeline = Arc::new(Self {
            jid,
            root_dir,
            kill_flag: Arc::new(AtomicBool::new(false)),
            stages: AsyncMutex::new(Vec::new()),
            status: parking_lot::Mutex::new(Status::New),
        });
        registry.register(jid, pipeline.clone());
        Ok(pipeline)
    }

    pub fn jid(&self) -> u64 {
        self.jid
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Append a stage, wired from the previous stage's outbound mailbox
    /// (or with no inbound, if this is the first stage). A stage's working
    /// directory is `{pipeline_root}/{stage_name}`.
    pub async fn add_stage(
        &self,
        name: impl Into<String>,
        executable: impl Into<String>,
        opts: Vec<String>,
        data_regex: &str,
        data_builder: Option<DataBuilder>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        let mut stages = self.stages.lock().await;
        if stages.iter().any(|stage| stage.name() == name) {
            return Err(PipelineError::DuplicateStageName(name));
        }
        let inbound = stages.last().map(Stage::outbound_mailbox);
        let odir = self.root_dir.join(&name);
        let stage = Stage::construct(
            name,
            executable,
            opts,
            odir,
            data_regex,
            data_builder,
            self.kill_flag.clone(),
            inbound,
        )?;
        stages.push(stage);
        Ok(())
    }

    /// Start every stage from `first` (or the beginning) onward. Stages
    /// after the restart point have their inbound mailboxes cleared in
    /// reverse order first, so a stale payload from a previous run can't
    /// leak into the new run; the restart point's own inbound mailbox is
    /// left untouched so it can replay the payload its worker republished
    /// on exit.
    pub async fn start(&self, first: Option<&str>) -> Result<(), PipelineError> {
        let start_index = {
            let stages = self.stages.lock().await;
            match first {
                None => 0,
                Some(name) => stages
                    .iter()
                    .position(|stage| stage.name() == name)
                    .ok_or_else(|| PipelineError::StageNotFound(name.to_string()))?,
            }
        };

        // A run already in flight must be stopped before this one starts, or
        // the old and new workers race as producer/consumer on the same
        // mailboxes and working directories.
        if self.status() == Status::Running {
            self.kill().await;
        }

        self.kill_flag.store(false, Ordering::SeqCst);
        *self.status.lock() = Status::Running;

        let stages = self.stages.lock().await;
        for stage in stages[start_index + 1..].iter().rev() {
            stage.clear_input_data().await;
        }
        for stage in &stages[start_index..] {
            stage.start().await;
        }
        Ok(())
    }

    /// Set the shared kill flag, then wait for every stage to stop.
    pub async fn kill(&self) {
        self.kill_flag.store(true, Ordering::SeqCst);
        self.wait().await;
    }

    /// Block until every stage has exited.
    pub async fn wait(&self) {
        let stages = self.stages.lock().await;
        for stage in stages.iter() {
            stage.wait().await;
        }
        drop(stages);
        self.update_status();
    }

    /// Reconcile this pipeline's own status from its stages' statuses.
    /// Killed if any stage is killed, terminated if every stage is
    /// terminated, running if any stage is running, new otherwise. Skips
    /// the update (rather than blocking) if the stage list is momentarily
    /// locked by a concurrent `add_stage`/`start`/`wait`.
    pub fn update_status(&self) {
        let Ok(stages) = self.stages.try_lock() else {
            return;
        };
        for stage in stages.iter() {
            stage.update_status();
        }
        let statuses: Vec<Status> = stages.iter().map(Stage::status).collect();
        *self.status.lock() = aggregate_status(&statuses);
    }

    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    /// Number of stages added so far.
    pub async fn stage_count(&self) -> usize {
        self.stages.lock().await.len()
    }

    /// The status of a named stage, reconciled as of the last
    /// `update_status()` call. `None` if no stage has that name.
    pub async fn stage_status(&self, name: &str) -> Option<Status> {
        let stages = self.stages.lock().await;
        stages.iter().find(|stage| stage.name() == name).map(Stage::status)
    }

    /// Open a named stage's `stdout`/`stderr` in a text editor.
    pub async fn peek(
        &self,
        stage_name: &str,
        stream: &str,
        editor: Option<&str>,
    ) -> Result<(), PipelineError> {
        let stages = self.stages.lock().await;
        let stage = stages
            .iter()
            .find(|stage| stage.name() == stage_name)
            .ok_or_else(|| PipelineError::StageNotFound(stage_name.to_string()))?;
        stage.peek(stream, editor)
    }
}

fn aggregate_status(statuses: &[Status]) -> Status {
    if statuses.is_empty() {
        return Status::New;
    }
    if statuses.iter().any(|status| *status == Status::Killed) {
        return Status::Killed;
    }
    if statuses.iter().all(|status| *status == Status::Terminated) {
        return Status::Terminated;
    }
    if statuses.iter().any(|status| *status == Status::Running) {
        return Status::Running;
    }
    Status::New
}

#[async_trait::async_trait]
impl crate::registry::Job for Pipeline {
    fn status(&self) -> Status {
        Pipeline::status(self)
    }

    fn update_status(&self) {
        Pipeline::update_status(self)
    }

    fn signal_kill(&self) {
        self.kill_flag.store(true, Ordering::SeqCst);
    }

    async fn wait(&self) {
        Pipeline::wait(self).await
    }
}

#[path = "pipeline_tests.rs"]
#[cfg(test)]
mod tests;
