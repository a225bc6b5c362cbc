// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single external command, its own worker, and its own working
//! directory — one link in a [`crate::pipeline::Pipeline`].

use crate::mailbox::Mailbox;
use crate::payload::Payload;
use crate::workspace::prepare_stage_dir;
use pipeworks_core::{PipelineError, Status};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How often a stage worker samples the kill flag while its child runs.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Maps a payload's path list to additional argv tokens for the next run.
///
/// The default builder joins paths with a single space and the worker
/// re-splits on whitespace, so paths containing whitespace are not
/// supported by the default builder — callers with such paths must supply
/// a custom builder.
pub type DataBuilder = Arc<dyn Fn(&[PathBuf]) -> String + Send + Sync>;

/// The default `data_builder`: paths joined by a single space.
pub fn default_data_builder() -> DataBuilder {
    Arc::new(|paths: &[PathBuf]| {
        paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" ")
    })
}

/// One external command with its own worker, working directory, and
/// inbound/outbound mailboxes.
pub struct Stage {
    name: String,
    executable: String,
    opts: Vec<String>,
    data_regex: Regex,
    data_builder: DataBuilder,
    odir: PathBuf,
    inbound: Option<Arc<Mailbox>>,
    outbound: Arc<Mailbox>,
    kill_flag: Arc<AtomicBool>,
    terminated_flag: Arc<AtomicBool>,
    status: parking_lot::Mutex<Status>,
    worker_done: Arc<AtomicBool>,
    worker_done_notify: Arc<Notify>,
}

impl Stage {
    /// Bind a stage's fields and compile `data_regex`, anchored so it must
    /// match a basename in full rather than a leading or trailing substring.
    /// `inbound` should be the previous stage's outbound mailbox, or `None`
    /// for the first stage in a pipeline. `kill_flag` is shared with the
    /// owning pipeline (or a fresh flag, for a standalone single-stage job).
    pub fn construct(
        name: impl Into<String>,
        executable: impl Into<String>,
        opts: Vec<String>,
        odir: PathBuf,
        data_regex: &str,
        data_builder: Option<DataBuilder>,
        kill_flag: Arc<AtomicBool>,
        inbound: Option<Arc<Mailbox>>,
    ) -> Result<Self, PipelineError> {
        let data_regex = Regex::new(&format!("^(?:{data_regex})$"))?;
        Ok(Self {
            name: name.into(),
            executable: executable.into(),
            opts,
            data_regex,
            data_builder: data_builder.unwrap_or_else(default_data_builder),
            odir,
            inbound,
            outbound: Arc::new(Mailbox::new()),
            kill_flag,
            terminated_flag: Arc::new(AtomicBool::new(false)),
            status: parking_lot::Mutex::new(Status::New),
            worker_done: Arc::new(AtomicBool::new(false)),
            worker_done_notify: Arc::new(Notify::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn odir(&self) -> &Path {
        &self.odir
    }

    /// This stage's outbound mailbox, to be wired as the next stage's inbound.
    pub fn outbound_mailbox(&self) -> Arc<Mailbox> {
        self.outbound.clone()
    }

    /// `"{pipeline_jid}/{stage_name}"`, for logging (ported from the
    /// original's `Step.full_name`).
    pub fn qualified_name(&self, pipeline_jid: u64) -> String {
        format!("{pipeline_jid}/{}", self.name)
    }

    /// Current status, as last reconciled by [`Stage::update_status`].
    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    /// Reconcile status from the worker's flags. Safe to call concurrently
    /// with the worker; does not itself run the worker.
    pub fn update_status(&self) {
        if self.terminated_flag.load(Ordering::SeqCst) {
            *self.status.lock() = Status::Terminated;
        } else if self.worker_done.load(Ordering::SeqCst) && self.kill_flag.load(Ordering::SeqCst)
        {
            *self.status.lock() = Status::Killed;
        }
    }

    /// Transition `new|terminated|killed → running` and spawn the worker.
    /// Concurrent `start()` on an already-running stage is undefined —
    /// callers must `kill()` or `wait()` first (`Pipeline` enforces this).
    pub async fn start(&self) {
        self.terminated_flag.store(false, Ordering::SeqCst);
        self.worker_done.store(false, Ordering::SeqCst);
        *self.status.lock() = Status::Running;

        let ctx = WorkerCtx {
            name: self.name.clone(),
            executable: self.executable.clone(),
            opts: self.opts.clone(),
            data_regex: self.data_regex.clone(),
            data_builder: self.data_builder.clone(),
            odir: self.odir.clone(),
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
            kill_flag: self.kill_flag.clone(),
            terminated_flag: self.terminated_flag.clone(),
        };
        let worker_done = self.worker_done.clone();
        let worker_done_notify = self.worker_done_notify.clone();
        tokio::spawn(async move {
            run_worker(ctx).await;
            worker_done.store(true, Ordering::SeqCst);
            worker_done_notify.notify_waiters();
        });
    }

    /// Block until the worker has exited. Safe to call from multiple tasks
    /// and multiple times.
    pub async fn wait(&self) {
        loop {
            if self.worker_done.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.worker_done_notify.notified();
            if self.worker_done.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Non-blockingly drain the inbound mailbox, so a restart from a later
    /// index doesn't hand this stage a stale payload.
    pub async fn clear_input_data(&self) {
        if let Some(mailbox) = &self.inbound {
            mailbox.clear().await;
        }
    }

    /// Open `stdout` or `stderr` from the working directory in a text
    /// editor. Blocks until the editor exits.
    pub fn peek(&self, stream: &str, editor: Option<&str>) -> Result<(), PipelineError> {
        let filename = match stream {
            "stdout" => "stdout",
            "stderr" => "stderr",
            other => return Err(PipelineError::InvalidArgument(other.to_string())),
        };
        let editor = resolve_editor(editor)?;
        let path = self.odir.join(filename);
        std::process::Command::new(&editor).arg(&path).status()?;
        Ok(())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status={}, odir={})", self.name, self.status(), self.odir.display())
    }
}

#[async_trait::async_trait]
impl crate::registry::Job for Stage {
    fn status(&self) -> Status {
        Stage::status(self)
    }

    fn update_status(&self) {
        Stage::update_status(self)
    }

    fn signal_kill(&self) {
        self.kill_flag.store(true, Ordering::SeqCst);
    }

    async fn wait(&self) {
        Stage::wait(self).await
    }
}

/// Resolve an editor: the caller's explicit choice, else `$EDITOR`, else
/// the first of a short list of common editors found on `PATH`.
fn resolve_editor(explicit: Option<&str>) -> Result<String, PipelineError> {
    if let Some(editor) = explicit {
        return Ok(editor.to_string());
    }
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.trim().is_empty() {
            return Ok(editor);
        }
    }
    for candidate in ["vi", "nano", "emacs"] {
        if which(candidate).is_some() {
            return Ok(candidate.to_string());
        }
    }
    Err(PipelineError::EditorNotFound)
}

fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).map(|dir| dir.join(bin)).find(|p| p.is_file())
}

/// Owned copy of everything the worker task needs, so it can outlive the
/// `&self` call to [`Stage::start`].
struct WorkerCtx {
    name: String,
    executable: String,
    opts: Vec<String>,
    data_regex: Regex,
    data_builder: DataBuilder,
    odir: PathBuf,
    inbound: Option<Arc<Mailbox>>,
    outbound: Arc<Mailbox>,
    kill_flag: Arc<AtomicBool>,
    terminated_flag: Arc<AtomicBool>,
}

/// The worker algorithm: consume, prepare, run, publish, republish.
async fn run_worker(ctx: WorkerCtx) {
    let consumed = match &ctx.inbound {
        Some(mailbox) => Some(mailbox.get().await),
        None => None,
    };

    let mut killed = matches!(consumed, Some(Payload::Kill));
    let extra_argv: Vec<String> = match &consumed {
        Some(Payload::Files(paths)) => tokenize(&(ctx.data_builder)(paths)),
        _ => Vec::new(),
    };

    if !killed && ctx.kill_flag.load(Ordering::SeqCst) {
        killed = true;
    }

    if !killed {
        if let Err(error) = prepare_stage_dir(&ctx.odir).await {
            tracing::error!(stage = %ctx.name, %error, "failed to prepare working directory");
            ctx.kill_flag.store(true, Ordering::SeqCst);
            killed = true;
        }
    }

    if !killed {
        killed = !run_child(&ctx, &extra_argv).await;
    }

    if killed {
        tracing::warn!(stage = %ctx.name, "stage killed");
        ctx.outbound.put(Payload::Kill).await;
    } else {
        let files = match list_matches(&ctx.odir, &ctx.data_regex).await {
            Ok(files) => files,
            Err(error) => {
                tracing::error!(stage = %ctx.name, %error, "failed to list output directory");
                Vec::new()
            }
        };
        tracing::info!(stage = %ctx.name, count = files.len(), "stage terminated");
        ctx.outbound.put(Payload::Files(files)).await;
        ctx.terminated_flag.store(true, Ordering::SeqCst);
    }

    // Republish the consumed payload so restart-from-later-index can
    // observe this stage's last output without re-running it.
    if let (Some(mailbox), Some(payload)) = (&ctx.inbound, consumed) {
        mailbox.put(payload).await;
    }
}

/// Spawn the child and poll until it exits or the kill flag is observed.
/// Returns `true` on a clean exit (status 0, kill never observed).
async fn run_child(ctx: &WorkerCtx, extra_argv: &[String]) -> bool {
    let stdout = match std::fs::File::create(ctx.odir.join("stdout")) {
        Ok(file) => file,
        Err(error) => {
            tracing::error!(stage = %ctx.name, %error, "failed to open stdout");
            ctx.kill_flag.store(true, Ordering::SeqCst);
            return false;
        }
    };
    let stderr = match std::fs::File::create(ctx.odir.join("stderr")) {
        Ok(file) => file,
        Err(error) => {
            tracing::error!(stage = %ctx.name, %error, "failed to open stderr");
            ctx.kill_flag.store(true, Ordering::SeqCst);
            return false;
        }
    };

    let mut command = tokio::process::Command::new(&ctx.executable);
    command
        .args(&ctx.opts)
        .args(extra_argv)
        .current_dir(&ctx.odir)
        .stdout(std::process::Stdio::from(stdout))
        .stderr(std::process::Stdio::from(stderr))
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            tracing::error!(stage = %ctx.name, %error, "failed to spawn child");
            ctx.kill_flag.store(true, Ordering::SeqCst);
            return false;
        }
    };

    loop {
        match child.try_wait() {
            Ok(Some(exit_status)) => {
                if exit_status.success() {
                    return true;
                }
                tracing::warn!(stage = %ctx.name, %exit_status, "stage exited with failure");
                ctx.kill_flag.store(true, Ordering::SeqCst);
                return false;
            }
            Ok(None) => {
                if ctx.kill_flag.load(Ordering::SeqCst) {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return false;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(error) => {
                tracing::error!(stage = %ctx.name, %error, "failed to poll child");
                ctx.kill_flag.store(true, Ordering::SeqCst);
                return false;
            }
        }
    }
}

fn tokenize(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

async fn list_matches(dir: &Path, regex: &Regex) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if regex.is_match(&name) {
            out.push(dir.join(&*name));
        }
    }
    Ok(out)
}

#[path = "stage_tests.rs"]
#[cfg(test)]
mod tests;
