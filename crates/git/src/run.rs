// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared `git` invocation helper. Every Git Orchestrator operation runs
//! `git` through the Sandboxed Executor (C1) rather than shelling out
//! directly, so worktree/session operations are subject to whatever
//! sandbox policy the caller attached to the executor.

use std::path::Path;

use vibe80_core::Clock;
use vibe80_exec::{ExecOpts, Executor, RunOutput};

use crate::error::GitError;

pub async fn run_git<C: Clock>(executor: &Executor<C>, cwd: &Path, args: &[String]) -> Result<(), GitError> {
    git_output_as(executor, "host", cwd, args).await.map(|_| ())
}

pub async fn git_output<C: Clock>(executor: &Executor<C>, cwd: &Path, args: &[String]) -> Result<RunOutput, GitError> {
    git_output_as(executor, "host", cwd, args).await
}

pub async fn git_output_as<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    cwd: &Path,
    args: &[String],
) -> Result<RunOutput, GitError> {
    let mut argv = vec!["git".to_string()];
    argv.extend_from_slice(args);
    let opts = ExecOpts { cwd: Some(cwd.to_path_buf()), ..Default::default() };
    let out = executor.run(workspace_id, &argv, &opts).await?;
    if !out.success() {
        return Err(GitError::CommandFailed {
            command: argv.join(" "),
            status: out.exit_code.unwrap_or(-1),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        });
    }
    Ok(out)
}

pub fn stdout_lines(out: &RunOutput) -> Vec<String> {
    String::from_utf8_lossy(&out.stdout).lines().map(str::to_string).collect()
}
