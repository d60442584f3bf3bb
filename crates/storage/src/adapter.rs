// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Storage Adapter contract (spec.md §4.2): pluggable durable state
//! behind one async trait. All writes are atomic per record;
//! `append_worktree_message` is idempotent on `(worktree_id, message.id)`;
//! `rotate_workspace_refresh_token` is linearizable.

use crate::error::StorageError;
use crate::refresh::RotateDecision;
use async_trait::async_trait;
use vibe80_core::{ChatMessage, RefreshTokenRecord, RpcLogEntry, Session, Workspace, Worktree};

#[derive(Debug, Clone)]
pub struct RotateOutcome {
    pub decision: RotateDecision,
    pub workspace_id: Option<String>,
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn save_workspace(&self, workspace: Workspace) -> Result<(), StorageError>;
    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StorageError>;

    async fn list_sessions(&self, workspace_id: &str) -> Result<Vec<Session>, StorageError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError>;
    async fn save_session(&self, session: Session) -> Result<(), StorageError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError>;

    async fn save_worktree(&self, session_id: &str, worktree: Worktree) -> Result<(), StorageError>;
    async fn load_worktrees(&self, session_id: &str) -> Result<Vec<Worktree>, StorageError>;

    async fn append_worktree_message(
        &self,
        worktree_id: &str,
        message: ChatMessage,
    ) -> Result<(), StorageError>;
    async fn load_worktree_messages(&self, worktree_id: &str) -> Result<Vec<ChatMessage>, StorageError>;

    async fn append_rpc_log(&self, session_id: &str, entry: RpcLogEntry) -> Result<(), StorageError>;
    /// Bounded by the adapter's ring capacity (default 500, spec.md §4.2).
    async fn load_rpc_logs(&self, session_id: &str) -> Result<Vec<RpcLogEntry>, StorageError>;

    async fn save_workspace_refresh_token(
        &self,
        workspace_id: &str,
        record: RefreshTokenRecord,
    ) -> Result<(), StorageError>;
    async fn get_workspace_refresh_state(
        &self,
        workspace_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StorageError>;

    /// Performs the CAS described by [`crate::refresh::decide`] and, on
    /// [`RotateDecision::Accept`], persists `next_hash`/`next_expires_at_ms`
    /// as the new current (moving the old current to previous with a grace
    /// window of `ttl_ms`... actually the grace window, see callers).
    async fn rotate_workspace_refresh_token(
        &self,
        workspace_id: &str,
        current_hash: &str,
        next_hash: &str,
        next_expires_at_ms: u64,
        grace_ms: u64,
        now_ms: u64,
    ) -> Result<RotateOutcome, StorageError>;
}
