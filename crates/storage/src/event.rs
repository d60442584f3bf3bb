// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Every durable mutation the Storage Adapter makes is expressed as one of
//! these events before it touches the write-ahead log. `MaterializedState`
//! replays them in order to rebuild in-memory state on boot.

use serde::{Deserialize, Serialize};
use vibe80_core::{ChatMessage, RefreshTokenRecord, RpcLogEntry, Session, Workspace, Worktree};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageEvent {
    WorkspaceSaved { workspace: Workspace },
    SessionSaved { session: Session },
    SessionDeleted { session_id: String },
    WorktreeSaved { session_id: String, worktree: Worktree },
    WorktreeMessageAppended { worktree_id: String, message: ChatMessage },
    RpcLogAppended { session_id: String, entry: RpcLogEntry },
    RefreshTokenUpserted { workspace_id: String, record: RefreshTokenRecord },
    RefreshTokenCleared { workspace_id: String },
}

/// One line of the write-ahead log: a monotonic sequence number plus the
/// event it records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: StorageEvent,
}
