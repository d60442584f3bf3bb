// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vibe80_wire::ErrorCode;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("child process failed to spawn: {0}")]
    Spawn(#[from] vibe80_exec::ExecError),

    #[error("child exited before replying to {method}")]
    ChildExited { method: String },

    #[error("request {method} timed out")]
    Timeout { method: String },

    #[error("child-reported error for {method}: {message}")]
    Rpc { method: String, message: String },

    #[error("{0} does not support turn interruption")]
    InterruptUnsupported(vibe80_core::Provider),

    #[error("client is not running")]
    NotStarted,

    #[error("client is already running")]
    AlreadyStarted,

    #[error("malformed response from child: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error communicating with child: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Maps onto the wire-facing taxonomy (spec.md §7) at the API boundary.
    /// None of this crate's failures have a dedicated wire code — they all
    /// surface to clients as a `turn_error`/`worktree_status` envelope
    /// carrying the message, not a structured `ErrorCode` (§7 "Propagation
    /// policy": "Child-process spawn failures mark the worktree `error`").
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::InternalError
    }
}
