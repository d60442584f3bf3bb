// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state rebuilt by replaying [`StorageEvent`]s from the WAL.

use crate::event::StorageEvent;
use std::collections::HashMap;
use vibe80_core::{ChatMessage, RefreshTokenRecord, RpcLogRing, Session, Workspace, Worktree};

#[derive(Debug, Default)]
pub struct MaterializedState {
    pub workspaces: HashMap<String, Workspace>,
    pub sessions: HashMap<String, Session>,
    pub worktrees: HashMap<String, Vec<Worktree>>,
    pub messages: HashMap<String, Vec<ChatMessage>>,
    pub rpc_logs: HashMap<String, RpcLogRing>,
    pub refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

impl MaterializedState {
    pub fn apply(&mut self, event: &StorageEvent) {
        match event {
            StorageEvent::WorkspaceSaved { workspace } => {
                self.workspaces.insert(workspace.id.to_string(), workspace.clone());
            }
            StorageEvent::SessionSaved { session } => {
                self.sessions.insert(session.id.to_string(), session.clone());
            }
            StorageEvent::SessionDeleted { session_id } => {
                self.sessions.remove(session_id);
                self.worktrees.remove(session_id);
                self.rpc_logs.remove(session_id);
            }
            StorageEvent::WorktreeSaved { session_id, worktree } => {
                let list = self.worktrees.entry(session_id.clone()).or_default();
                if let Some(existing) = list.iter_mut().find(|w| w.id == worktree.id) {
                    *existing = worktree.clone();
                } else {
                    list.push(worktree.clone());
                }
            }
            StorageEvent::WorktreeMessageAppended { worktree_id, message } => {
                let list = self.messages.entry(worktree_id.clone()).or_default();
                if !list.iter().any(|m| m.id == message.id) {
                    list.push(message.clone());
                }
            }
            StorageEvent::RpcLogAppended { session_id, entry } => {
                self.rpc_logs.entry(session_id.clone()).or_default().push(entry.clone());
            }
            StorageEvent::RefreshTokenUpserted { workspace_id, record } => {
                self.refresh_tokens.insert(workspace_id.clone(), record.clone());
            }
            StorageEvent::RefreshTokenCleared { workspace_id } => {
                self.refresh_tokens.remove(workspace_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::Provider;

    #[test]
    fn message_append_dedupes_by_id() {
        let mut state = MaterializedState::default();
        let msg = ChatMessage::user("m1", "hi", Provider::Codex, 1);
        state.apply(&StorageEvent::WorktreeMessageAppended { worktree_id: "main".into(), message: msg.clone() });
        state.apply(&StorageEvent::WorktreeMessageAppended { worktree_id: "main".into(), message: msg });
        assert_eq!(state.messages["main"].len(), 1);
    }

    #[test]
    fn session_delete_clears_dependent_state() {
        let mut state = MaterializedState::default();
        state.worktrees.insert("s1".into(), vec![]);
        state.apply(&StorageEvent::SessionDeleted { session_id: "s1".into() });
        assert!(!state.worktrees.contains_key("s1"));
    }
}
