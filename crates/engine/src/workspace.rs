// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-directory allocation.
//!
//! Mints a fresh numbered subdirectory under a root path: existing
//! integer-named entries are scanned, and the new directory is named
//! `max(entries) + 1` (or `0` if the root is empty/missing). A sibling
//! entry whose name does not parse as an integer is a hard error — the
//! original Python implementation (`stepped_job/utils.py::create_dir`)
//! parses every entry with `int()` and lets that raise, and this
//! workspace preserves that strictness rather than silently skipping
//! unexpected entries.

use pipeworks_core::PipelineError;
use std::path::{Path, PathBuf};

const DEFAULT_ROOT: &str = "output";

/// Allocate the next numbered subdirectory under `root` (or `"output"` if
/// `root` is `None`). Returns the new directory's path and its numeric id.
pub async fn allocate_subdir(root: Option<&Path>) -> Result<(PathBuf, u64), PipelineError> {
    let root: PathBuf = root.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
    tokio::fs::create_dir_all(&root).await?;

    let mut next = 0u64;
    let mut entries = tokio::fs::read_dir(&root).await?;
    let mut any = false;
    while let Some(entry) = entries.next_entry().await? {
        any = true;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let id: u64 = name
            .parse()
            .map_err(|_| PipelineError::NonNumericEntry(name.into_owned(), root.clone()))?;
        next = next.max(id + 1);
    }
    let pid = if any { next } else { 0 };

    let dir = root.join(pid.to_string());
    tokio::fs::create_dir(&dir).await?;
    Ok((dir, pid))
}

/// Allocate subdirectory `id` directly under `root`, without scanning for
/// the next free slot. Used by [`crate::pipeline::Pipeline::construct`] so
/// a pipeline's working directory name always matches its registry `jid`.
pub async fn allocate_subdir_named(root: &Path, id: u64) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(root).await?;
    let dir = root.join(id.to_string());
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Prepare a stage's working directory for a run: wipe its contents if it
/// already exists (siblings are untouched), or create it fresh.
pub async fn prepare_stage_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
    } else {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
