// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A Git working tree bound to one provider and one agent child process.

use crate::error::CoreError;
use crate::id::WorktreeId;
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Worktree lifecycle status (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Creating,
    Ready,
    Processing,
    Stopped,
    Error,
    MergeConflict,
}

impl WorktreeStatus {
    /// Whether `self -> next` is an allowed transition (spec.md §4.6 lifecycle,
    /// §3 invariant "status transitions are constrained").
    pub fn can_transition_to(self, next: WorktreeStatus) -> bool {
        use WorktreeStatus::*;
        match (self, next) {
            // Idempotent transitions are always allowed.
            (a, b) if a == b => true,
            (Creating, Ready | Error) => true,
            (Ready, Processing | Stopped | Error) => true,
            (Processing, Ready | Stopped | Error | MergeConflict) => true,
            (MergeConflict, Ready | Error) => true,
            (Stopped, Ready | Processing | Error) => true,
            (Error, Ready | Stopped) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub id: WorktreeId,
    pub branch_name: String,
    pub path: PathBuf,
    pub provider: Provider,
    pub status: WorktreeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub color: String,
    pub created_at_ms: u64,
    pub last_activity_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_worktree_id: Option<WorktreeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_git_credentials_access: Option<bool>,
}

impl Worktree {
    pub fn is_main(&self) -> bool {
        self.id.is_main()
    }

    /// Apply a status transition, enforcing spec.md §3/§4.6's constraints.
    pub fn transition(&mut self, next: WorktreeStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                worktree: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Effective internet-access policy, falling back to the session default.
    pub fn effective_internet_access(&self, session_default: bool) -> bool {
        self.internet_access.unwrap_or(session_default)
    }

    /// Effective deny-git-credentials policy, falling back to the session
    /// default. Per §4.1, `internetAccess=false` forces this to `true`
    /// regardless of any override (§4.1 invariant, validated by the Git
    /// Orchestrator before spawn — see `vibe80-git`).
    pub fn effective_deny_git_credentials(&self, session_default: bool) -> bool {
        self.deny_git_credentials_access.unwrap_or(session_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worktree(status: WorktreeStatus) -> Worktree {
        Worktree {
            id: WorktreeId::generate(),
            branch_name: "wt-abc123-test".into(),
            path: PathBuf::from("/tmp/wt"),
            provider: Provider::Codex,
            status,
            thread_id: None,
            color: "#ff0000".into(),
            created_at_ms: 0,
            last_activity_at_ms: 0,
            parent_worktree_id: None,
            internet_access: None,
            deny_git_credentials_access: None,
        }
    }

    #[test]
    fn creating_can_become_ready_or_error() {
        assert!(WorktreeStatus::Creating.can_transition_to(WorktreeStatus::Ready));
        assert!(WorktreeStatus::Creating.can_transition_to(WorktreeStatus::Error));
        assert!(!WorktreeStatus::Creating.can_transition_to(WorktreeStatus::Processing));
    }

    #[test]
    fn ready_cannot_jump_to_merge_conflict_directly() {
        assert!(!WorktreeStatus::Ready.can_transition_to(WorktreeStatus::MergeConflict));
    }

    #[test]
    fn transition_rejects_invalid_edges() {
        let mut wt = worktree(WorktreeStatus::Creating);
        let err = wt.transition(WorktreeStatus::Processing).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
        assert_eq!(wt.status, WorktreeStatus::Creating);
    }

    #[test]
    fn transition_accepts_valid_edges() {
        let mut wt = worktree(WorktreeStatus::Ready);
        wt.transition(WorktreeStatus::Processing).unwrap();
        assert_eq!(wt.status, WorktreeStatus::Processing);
    }

    #[test]
    fn internet_access_falls_back_to_session_default() {
        let wt = worktree(WorktreeStatus::Ready);
        assert!(wt.effective_internet_access(true));
        assert!(!wt.effective_internet_access(false));
    }
}
