// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors the daemon's dispatch layer (C10) can produce, each mapped onto
//! the wire taxonomy (spec.md §7) at the boundary.

use thiserror::Error;
use vibe80_wire::ErrorCode;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("workspace token missing")]
    WorkspaceTokenMissing,

    #[error("workspace token invalid")]
    WorkspaceTokenInvalid,

    #[error("unknown session")]
    SessionNotFound,

    #[error("worktree not found")]
    WorktreeNotFound,

    #[error("provider not enabled: {0}")]
    ProviderNotEnabled(vibe80_core::Provider),

    #[error("provider in use")]
    ProviderInUse,

    #[error("action kind {kind:?} is disabled by configuration")]
    ActionDisabled { kind: vibe80_wire::ActionKind },

    #[error(transparent)]
    Storage(#[from] vibe80_storage::StorageError),

    #[error(transparent)]
    Auth(#[from] vibe80_auth::AuthError),

    #[error(transparent)]
    Git(#[from] vibe80_git::GitError),

    #[error(transparent)]
    Exec(#[from] vibe80_exec::ExecError),

    #[error(transparent)]
    Supervisor(#[from] vibe80_supervisor::SupervisorError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DaemonError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DaemonError::WorkspaceTokenMissing => ErrorCode::WorkspaceTokenMissing,
            DaemonError::WorkspaceTokenInvalid => ErrorCode::WorkspaceTokenInvalid,
            DaemonError::SessionNotFound => ErrorCode::SessionNotFound,
            DaemonError::WorktreeNotFound => ErrorCode::WorktreeNotFound,
            DaemonError::ProviderNotEnabled(_) => ErrorCode::ProviderNotEnabled,
            DaemonError::ProviderInUse => ErrorCode::ProviderInUse,
            DaemonError::ActionDisabled { .. } => ErrorCode::InternalError,
            DaemonError::Auth(err) => err.error_code(),
            DaemonError::Supervisor(err) => err.error_code(),
            DaemonError::Storage(_) | DaemonError::Git(_) | DaemonError::Exec(_) | DaemonError::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }
}
