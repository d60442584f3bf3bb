// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid id: {0}")]
    InvalidId(#[from] vibe80_core::id::InvalidId),
}
