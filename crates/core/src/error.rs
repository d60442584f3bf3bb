// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error type for domain-model invariant violations.

use crate::id::InvalidId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("provider {0:?} is not enabled for this workspace")]
    ProviderNotEnabled(crate::provider::Provider),

    #[error("provider {0} is in use by an active session and cannot be disabled")]
    ProviderInUse(crate::provider::Provider),

    #[error("invalid status transition for worktree {worktree}: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        worktree: String,
        from: crate::worktree::WorktreeStatus,
        to: crate::worktree::WorktreeStatus,
    },

    #[error("internetAccess=false requires denyGitCredentialsAccess=true")]
    InconsistentSandboxPolicy,
}
