// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree lifecycle operations (Git Orchestrator, spec.md §4.5):
//! create/remove, merge/cherry-pick/abort, diff/status/commits.

use std::path::Path;

use vibe80_core::{Clock, WorktreeId};
use vibe80_exec::Executor;

use crate::error::GitError;
use crate::run::{git_output_as, run_git, stdout_lines};

/// Where to branch a new worktree from (spec.md §4.5 resolution order):
/// an explicit starting branch on `origin`, else the parent worktree's
/// current HEAD, else the session's own HEAD.
pub fn resolve_starting_ref(starting_branch: Option<&str>, parent_head: Option<&str>) -> String {
    if let Some(branch) = starting_branch {
        return format!("origin/{branch}");
    }
    if let Some(head) = parent_head {
        return head.to_string();
    }
    "HEAD".to_string()
}

/// `wt-<id6>-<slug>`, or the caller's own branch name when one is supplied
/// and already exists on `origin`.
pub fn branch_name(worktree_id: &WorktreeId, slug: &str, caller_branch: Option<&str>) -> String {
    if let Some(branch) = caller_branch {
        return branch.to_string();
    }
    let id6 = &worktree_id.as_str()[..6];
    let slug = slugify(slug);
    format!("wt-{id6}-{slug}")
}

fn slugify(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() { "wt".to_string() } else { trimmed.to_string() }
}

/// Checks whether `branch` exists on `origin` in the repo at `repo_dir`.
pub async fn branch_exists_on_origin<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    repo_dir: &Path,
    branch: &str,
) -> Result<bool, GitError> {
    let argv = vec!["ls-remote".to_string(), "--heads".to_string(), "origin".to_string(), branch.to_string()];
    let out = git_output_as(executor, workspace_id, repo_dir, &argv).await?;
    Ok(!out.stdout.is_empty())
}

/// `git worktree add` plus wiring `branch.<name>.{remote,merge}` so pushes
/// and pulls default to the matching `origin` branch.
pub async fn create_worktree<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    repo_dir: &Path,
    worktree_path: &Path,
    branch: &str,
    branch_already_exists: bool,
    starting_ref: &str,
) -> Result<(), GitError> {
    if let Some(parent) = worktree_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut argv = vec!["worktree".to_string(), "add".to_string()];
    if !branch_already_exists {
        argv.push("-b".to_string());
        argv.push(branch.to_string());
        argv.push(worktree_path.display().to_string());
        argv.push(starting_ref.to_string());
    } else {
        argv.push(worktree_path.display().to_string());
        argv.push(branch.to_string());
    }
    git_output_as(executor, workspace_id, repo_dir, &argv).await?;

    run_git(
        executor,
        repo_dir,
        &["config".into(), format!("branch.{branch}.remote"), "origin".into()],
    )
    .await?;
    run_git(
        executor,
        repo_dir,
        &["config".into(), format!("branch.{branch}.merge"), format!("refs/heads/{branch}")],
    )
    .await?;
    Ok(())
}

/// Removes a worktree and, best-effort, its branch. Mirrors the
/// log-don't-fail cleanup style used elsewhere: a failure to delete the
/// branch does not prevent the worktree directory from going away.
pub async fn remove_worktree<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    repo_dir: &Path,
    worktree_path: &Path,
    branch: &str,
) -> Result<(), GitError> {
    let argv = vec!["worktree".to_string(), "remove".to_string(), "--force".to_string(), worktree_path.display().to_string()];
    git_output_as(executor, workspace_id, repo_dir, &argv).await?;

    if let Err(e) = run_git(executor, repo_dir, &["branch".into(), "-D".into(), branch.into()]).await {
        tracing::warn!(branch, error = %e, "failed to delete worktree branch (best-effort)");
    }
    Ok(())
}

/// Merges `source_branch` into the worktree's current branch. On conflict,
/// returns [`GitError::Conflicted`] leaving the merge in progress for the
/// caller to resolve or abort.
pub async fn merge<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    worktree_path: &Path,
    source_branch: &str,
) -> Result<(), GitError> {
    let argv = vec!["merge".to_string(), "--no-edit".to_string(), source_branch.to_string()];
    match git_output_as(executor, workspace_id, worktree_path, &argv).await {
        Ok(_) => Ok(()),
        Err(GitError::CommandFailed { .. }) if has_conflicts(executor, workspace_id, worktree_path).await? => {
            Err(GitError::Conflicted)
        }
        Err(e) => Err(e),
    }
}

pub async fn cherry_pick<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    worktree_path: &Path,
    commit: &str,
) -> Result<(), GitError> {
    let argv = vec!["cherry-pick".to_string(), commit.to_string()];
    match git_output_as(executor, workspace_id, worktree_path, &argv).await {
        Ok(_) => Ok(()),
        Err(GitError::CommandFailed { .. }) if has_conflicts(executor, workspace_id, worktree_path).await? => {
            Err(GitError::Conflicted)
        }
        Err(e) => Err(e),
    }
}

/// Aborts an in-progress merge or cherry-pick, whichever left a control file
/// behind.
pub async fn abort<C: Clock>(executor: &Executor<C>, workspace_id: &str, worktree_path: &Path) -> Result<(), GitError> {
    // `.git` in a linked worktree is a file pointing at the real per-worktree
    // git dir, so ask git itself where MERGE_HEAD would live rather than
    // guessing the path.
    let argv = vec!["rev-parse".to_string(), "--git-path".to_string(), "MERGE_HEAD".to_string()];
    let out = git_output_as(executor, workspace_id, worktree_path, &argv).await?;
    let merge_head_path = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if tokio::fs::try_exists(worktree_path.join(&merge_head_path)).await.unwrap_or(false) {
        return run_git(executor, worktree_path, &["merge".into(), "--abort".into()]).await;
    }
    run_git(executor, worktree_path, &["cherry-pick".into(), "--abort".into()]).await
}

/// Scans `git status --porcelain` for unresolved conflicts (`UU`/`AA`/...).
async fn has_conflicts<C: Clock>(executor: &Executor<C>, workspace_id: &str, worktree_path: &Path) -> Result<bool, GitError> {
    let out = git_output_as(executor, workspace_id, worktree_path, &["status".to_string(), "--porcelain".to_string()]).await?;
    Ok(stdout_lines(&out).iter().any(|line| {
        let code = line.get(0..2).unwrap_or("");
        matches!(code, "UU" | "AA" | "DD" | "AU" | "UA" | "DU" | "UD")
    }))
}

#[derive(Debug, Clone)]
pub struct WorktreeStatusReport {
    pub conflicted: bool,
    pub dirty: bool,
    pub changed_paths: Vec<String>,
}

pub async fn status<C: Clock>(executor: &Executor<C>, workspace_id: &str, worktree_path: &Path) -> Result<WorktreeStatusReport, GitError> {
    let out = git_output_as(executor, workspace_id, worktree_path, &["status".to_string(), "--porcelain".to_string()]).await?;
    let lines = stdout_lines(&out);
    let conflicted = lines.iter().any(|line| {
        matches!(line.get(0..2).unwrap_or(""), "UU" | "AA" | "DD" | "AU" | "UA" | "DU" | "UD")
    });
    Ok(WorktreeStatusReport { conflicted, dirty: !lines.is_empty(), changed_paths: lines })
}

pub async fn diff<C: Clock>(executor: &Executor<C>, workspace_id: &str, worktree_path: &Path, base: &str) -> Result<String, GitError> {
    let out = git_output_as(executor, workspace_id, worktree_path, &["diff".to_string(), base.to_string()]).await?;
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub sha: String,
    pub subject: String,
}

pub async fn commits<C: Clock>(
    executor: &Executor<C>,
    workspace_id: &str,
    worktree_path: &Path,
    base: &str,
) -> Result<Vec<CommitSummary>, GitError> {
    let argv = vec!["log".to_string(), "--format=%H%x09%s".to_string(), format!("{base}..HEAD")];
    let out = git_output_as(executor, workspace_id, worktree_path, &argv).await?;
    Ok(stdout_lines(&out)
        .into_iter()
        .filter_map(|line| {
            let mut parts = line.splitn(2, '\t');
            Some(CommitSummary { sha: parts.next()?.to_string(), subject: parts.next().unwrap_or("").to_string() })
        })
        .collect())
}
