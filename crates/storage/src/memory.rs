// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pure in-memory [`StorageAdapter`] with no durability — used by tests
//! and by the integration-test harness that exercises end-to-end scenarios
//! without touching disk.

use crate::adapter::{RotateOutcome, StorageAdapter};
use crate::error::StorageError;
use crate::refresh::{self, RotateDecision};
use crate::state::MaterializedState;
use async_trait::async_trait;
use parking_lot::Mutex;
use vibe80_core::{ChatMessage, RefreshTokenRecord, RpcLogEntry, Session, Workspace, WorkspaceId, Worktree};

#[derive(Default)]
pub struct MemoryStorageAdapter {
    state: Mutex<MaterializedState>,
}

impl MemoryStorageAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorageAdapter {
    async fn save_workspace(&self, workspace: Workspace) -> Result<(), StorageError> {
        self.state.lock().workspaces.insert(workspace.id.to_string(), workspace);
        Ok(())
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StorageError> {
        Ok(self.state.lock().workspaces.get(workspace_id).cloned())
    }

    async fn list_sessions(&self, workspace_id: &str) -> Result<Vec<Session>, StorageError> {
        Ok(self
            .state
            .lock()
            .sessions
            .values()
            .filter(|s| s.workspace_id.to_string() == workspace_id)
            .cloned()
            .collect())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.state.lock().sessions.get(session_id).cloned())
    }

    async fn save_session(&self, session: Session) -> Result<(), StorageError> {
        self.state.lock().sessions.insert(session.id.to_string(), session);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.sessions.remove(session_id);
        state.worktrees.remove(session_id);
        state.rpc_logs.remove(session_id);
        Ok(())
    }

    async fn save_worktree(&self, session_id: &str, worktree: Worktree) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let list = state.worktrees.entry(session_id.to_string()).or_default();
        if let Some(existing) = list.iter_mut().find(|w| w.id == worktree.id) {
            *existing = worktree;
        } else {
            list.push(worktree);
        }
        Ok(())
    }

    async fn load_worktrees(&self, session_id: &str) -> Result<Vec<Worktree>, StorageError> {
        Ok(self.state.lock().worktrees.get(session_id).cloned().unwrap_or_default())
    }

    async fn append_worktree_message(
        &self,
        worktree_id: &str,
        message: ChatMessage,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let list = state.messages.entry(worktree_id.to_string()).or_default();
        if !list.iter().any(|m| m.id == message.id) {
            list.push(message);
        }
        Ok(())
    }

    async fn load_worktree_messages(&self, worktree_id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(self.state.lock().messages.get(worktree_id).cloned().unwrap_or_default())
    }

    async fn append_rpc_log(&self, session_id: &str, entry: RpcLogEntry) -> Result<(), StorageError> {
        self.state.lock().rpc_logs.entry(session_id.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn load_rpc_logs(&self, session_id: &str) -> Result<Vec<RpcLogEntry>, StorageError> {
        Ok(self
            .state
            .lock()
            .rpc_logs
            .get(session_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_workspace_refresh_token(
        &self,
        workspace_id: &str,
        record: RefreshTokenRecord,
    ) -> Result<(), StorageError> {
        self.state.lock().refresh_tokens.insert(workspace_id.to_string(), record);
        Ok(())
    }

    async fn get_workspace_refresh_state(
        &self,
        workspace_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StorageError> {
        Ok(self.state.lock().refresh_tokens.get(workspace_id).cloned())
    }

    async fn rotate_workspace_refresh_token(
        &self,
        workspace_id: &str,
        current_hash: &str,
        next_hash: &str,
        next_expires_at_ms: u64,
        grace_ms: u64,
        now_ms: u64,
    ) -> Result<RotateOutcome, StorageError> {
        let mut state = self.state.lock();
        let existing = state.refresh_tokens.get(workspace_id).cloned();
        let decision = refresh::decide(existing.as_ref(), current_hash, now_ms);

        match (&decision, existing) {
            (RotateDecision::Accept, Some(existing)) => {
                state.refresh_tokens.insert(
                    workspace_id.to_string(),
                    RefreshTokenRecord {
                        workspace_id: WorkspaceId::parse(workspace_id)?,
                        current_token_hash: next_hash.to_string(),
                        current_expires_at_ms: next_expires_at_ms,
                        previous_token_hash: Some(existing.current_token_hash),
                        previous_valid_until_ms: Some(now_ms + grace_ms),
                    },
                );
            }
            (RotateDecision::Reused, _) => {
                state.refresh_tokens.remove(workspace_id);
            }
            (RotateDecision::Accept, None) | (RotateDecision::AlreadyRotated, _)
            | (RotateDecision::Expired, _) | (RotateDecision::Unknown, _) => {}
        }

        Ok(RotateOutcome { decision, workspace_id: Some(workspace_id.to_string()) })
    }
}
