// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("working directory does not exist: {0}")]
    CwdMissing(String),

    #[error("failed to spawn helper for workspace {workspace_id}: {source}")]
    SpawnFailed { workspace_id: String, #[source] source: std::io::Error },

    #[error("helper exited non-zero for workspace {workspace_id} running {command:?}: {stderr}")]
    HelperFailed { workspace_id: String, command: Vec<String>, stderr: String },

    #[error("sandbox policy invalid: internet access disabled requires denying git credential access")]
    InconsistentPolicy,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("child process already exited")]
    AlreadyExited,

    #[error("spawned child is missing a piped stdio handle")]
    MissingStdio,
}
