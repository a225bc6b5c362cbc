// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds surfaced synchronously to callers.
//!
//! Runtime child failure is deliberately *not* one of these: a non-zero
//! exit is folded into `Status::Killed` and propagated through the kill
//! flag, never thrown across a worker boundary.

use std::path::PathBuf;

/// Errors surfaced synchronously by pipeline/stage construction and control.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// `add_stage` called with a name that already exists in the pipeline.
    #[error("stage \"{0}\" already exists in this pipeline")]
    DuplicateStageName(String),

    /// `start(first = name)` where `name` matches no stage.
    #[error("no stage named \"{0}\" in this pipeline")]
    StageNotFound(String),

    /// Stage construction with a malformed `data_regex`.
    #[error("invalid data_regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// `peek` called with an unknown stream name.
    #[error("unknown stream \"{0}\"; expected \"stdout\" or \"stderr\"")]
    InvalidArgument(String),

    /// `peek` could not resolve a text editor.
    #[error("no text editor available; pass one explicitly")]
    EditorNotFound,

    /// The working-directory allocator found a non-numeric sibling entry.
    #[error("non-numeric entry \"{0}\" under {1}")]
    NonNumericEntry(String, PathBuf),

    /// Filesystem or process I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
