// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-level git setup (Git Orchestrator, spec.md §4.5): clone the
//! repository and configure the default commit identity.

use vibe80_core::{Clock, SessionLayout};
use vibe80_exec::Executor;

use crate::error::GitError;
use crate::run::{git_output_as, run_git};

/// Clones `repo_url` into `layout.repo_dir` and sets `user.name`/`user.email`
/// for commits the agent makes on the session's behalf.
pub async fn clone_session<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    repo_url: &str,
    layout: &SessionLayout,
    author_name: &str,
    author_email: &str,
) -> Result<(), GitError> {
    if let Some(parent) = layout.repo_dir.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let argv = vec!["clone".to_string(), repo_url.to_string(), layout.repo_dir.display().to_string()];
    git_output_as(executor, workspace_id, &layout.session_dir, &argv).await?;

    run_git(executor, &layout.repo_dir, &["config".into(), "user.name".into(), author_name.into()]).await?;
    run_git(executor, &layout.repo_dir, &["config".into(), "user.email".into(), author_email.into()]).await?;
    Ok(())
}
