// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use vibe80_core::Provider;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("command execution failed: {0}")]
    Exec(#[from] vibe80_exec::ExecError),

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed { command: String, status: i32, stderr: String },

    #[error("no free uid found in configured range after {attempts} attempts")]
    UidExhausted { attempts: u32 },

    #[error("provider {0:?} is disabled but referenced by an active worktree")]
    ProviderInUse(Provider),

    #[error("provider {0:?} requires credentials but none were supplied")]
    MissingCredentials(Provider),

    #[error("provider {provider:?} config invalid: {reason}")]
    InvalidProviderConfig { provider: Provider, reason: &'static str },

    #[error("unsupported auth type for provider {0:?}")]
    UnsupportedAuthType(Provider),

    #[error("worktree has unresolved conflicts")]
    Conflicted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
