// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable [`StorageAdapter`]: every mutation is written to a
//! workspace-scoped WAL before the in-memory [`MaterializedState`] is
//! updated, so a crash between the two never loses a record. RPC log
//! entries additionally get appended as zstd-compressed segments, since the
//! in-memory ring `load_rpc_logs` reads from is bounded and the full
//! history is only useful for offline audit, mirroring the teacher's
//! WAL/snapshot compression.

use crate::adapter::{RotateOutcome, StorageAdapter};
use crate::error::StorageError;
use crate::event::StorageEvent;
use crate::refresh::{self, RotateDecision};
use crate::state::MaterializedState;
use crate::wal::Wal;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vibe80_core::{ChatMessage, RefreshTokenRecord, RpcLogEntry, Session, Workspace, WorkspaceId, Worktree};

struct Inner {
    wal: Wal,
    state: MaterializedState,
}

/// Appends `event` to the WAL and applies it to the materialized state
/// under an already-held guard, so callers that need to read-decide-write
/// atomically (e.g. refresh-token rotation) can do so across one lock
/// acquisition instead of two.
fn record_locked(inner: &mut Inner, event: StorageEvent) -> Result<(), StorageError> {
    let seq = inner
        .wal
        .append(&event)
        .map_err(|source| StorageError::Io { path: "wal".to_string(), source })?;
    inner.wal.flush().map_err(|source| StorageError::Io { path: "wal".to_string(), source })?;
    inner.state.apply(&event);
    inner.wal.mark_processed(seq);
    Ok(())
}

pub struct FileStorageAdapter {
    inner: Arc<Mutex<Inner>>,
    archive_dir: PathBuf,
}

impl FileStorageAdapter {
    /// Opens (or creates) the WAL at `wal_path`, replaying every entry into
    /// a fresh `MaterializedState`. `archive_dir` receives zstd-compressed
    /// RPC-log segments evicted from the in-memory ring.
    pub fn open(wal_path: impl AsRef<Path>, archive_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let wal_path = wal_path.as_ref();
        let mut wal = Wal::open(wal_path, 0)
            .map_err(|source| StorageError::Io { path: wal_path.display().to_string(), source })?;

        let mut state = MaterializedState::default();
        while let Some(entry) = wal
            .next_unprocessed()
            .map_err(|source| StorageError::Io { path: wal_path.display().to_string(), source })?
        {
            state.apply(&entry.event);
            wal.mark_processed(entry.seq);
        }

        let archive_dir = archive_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&archive_dir)
            .map_err(|source| StorageError::Io { path: archive_dir.display().to_string(), source })?;

        Ok(Self { inner: Arc::new(Mutex::new(Inner { wal, state })), archive_dir })
    }

    fn record(&self, event: StorageEvent) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        record_locked(&mut inner, event)
    }

    /// Compresses one RPC-log entry onto a per-session archive file.
    /// Archival failures are logged, not propagated — the entry is still
    /// in the durable WAL.
    fn archive_rpc_entry(&self, session_id: &str, entry: &RpcLogEntry) {
        let payload = match serde_json::to_vec(entry) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode rpc log entry for archival");
                return;
            }
        };
        let compressed = match zstd::encode_all(payload.as_slice(), 3) {
            Ok(compressed) => compressed,
            Err(err) => {
                tracing::warn!(error = %err, "failed to compress rpc log entry");
                return;
            }
        };
        let path = self.archive_dir.join(format!("{session_id}.ndjson.zst.part"));
        if let Err(err) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(&compressed)
            })
        {
            tracing::warn!(error = %err, path = %path.display(), "failed to append rpc archive segment");
        }
    }
}

#[async_trait]
impl StorageAdapter for FileStorageAdapter {
    async fn save_workspace(&self, workspace: Workspace) -> Result<(), StorageError> {
        self.record(StorageEvent::WorkspaceSaved { workspace })
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StorageError> {
        Ok(self.inner.lock().state.workspaces.get(workspace_id).cloned())
    }

    async fn list_sessions(&self, workspace_id: &str) -> Result<Vec<Session>, StorageError> {
        Ok(self
            .inner
            .lock()
            .state
            .sessions
            .values()
            .filter(|s| s.workspace_id.to_string() == workspace_id)
            .cloned()
            .collect())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.inner.lock().state.sessions.get(session_id).cloned())
    }

    async fn save_session(&self, session: Session) -> Result<(), StorageError> {
        self.record(StorageEvent::SessionSaved { session })
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.record(StorageEvent::SessionDeleted { session_id: session_id.to_string() })
    }

    async fn save_worktree(&self, session_id: &str, worktree: Worktree) -> Result<(), StorageError> {
        self.record(StorageEvent::WorktreeSaved { session_id: session_id.to_string(), worktree })
    }

    async fn load_worktrees(&self, session_id: &str) -> Result<Vec<Worktree>, StorageError> {
        Ok(self.inner.lock().state.worktrees.get(session_id).cloned().unwrap_or_default())
    }

    async fn append_worktree_message(
        &self,
        worktree_id: &str,
        message: ChatMessage,
    ) -> Result<(), StorageError> {
        self.record(StorageEvent::WorktreeMessageAppended { worktree_id: worktree_id.to_string(), message })
    }

    async fn load_worktree_messages(&self, worktree_id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(self.inner.lock().state.messages.get(worktree_id).cloned().unwrap_or_default())
    }

    async fn append_rpc_log(&self, session_id: &str, entry: RpcLogEntry) -> Result<(), StorageError> {
        self.archive_rpc_entry(session_id, &entry);
        self.record(StorageEvent::RpcLogAppended { session_id: session_id.to_string(), entry })
    }

    async fn load_rpc_logs(&self, session_id: &str) -> Result<Vec<RpcLogEntry>, StorageError> {
        Ok(self
            .inner
            .lock()
            .state
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
        self.record(StorageEvent::RefreshTokenUpserted { workspace_id: workspace_id.to_string(), record })
    }

    async fn get_workspace_refresh_state(
        &self,
        workspace_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StorageError> {
        Ok(self.inner.lock().state.refresh_tokens.get(workspace_id).cloned())
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
        let mut inner = self.inner.lock();
        let existing = inner.state.refresh_tokens.get(workspace_id).cloned();
        let decision = refresh::decide(existing.as_ref(), current_hash, now_ms);

        match (&decision, existing) {
            (RotateDecision::Accept, Some(existing)) => {
                record_locked(&mut inner, StorageEvent::RefreshTokenUpserted {
                    workspace_id: workspace_id.to_string(),
                    record: RefreshTokenRecord {
                        workspace_id: WorkspaceId::parse(workspace_id)?,
                        current_token_hash: next_hash.to_string(),
                        current_expires_at_ms: next_expires_at_ms,
                        previous_token_hash: Some(existing.current_token_hash),
                        previous_valid_until_ms: Some(now_ms + grace_ms),
                    },
                })?;
            }
            (RotateDecision::Reused, _) => {
                record_locked(&mut inner, StorageEvent::RefreshTokenCleared { workspace_id: workspace_id.to_string() })?;
            }
            (RotateDecision::Accept, None) | (RotateDecision::AlreadyRotated, _)
            | (RotateDecision::Expired, _) | (RotateDecision::Unknown, _) => {}
        }
        drop(inner);

        Ok(RotateOutcome { decision, workspace_id: Some(workspace_id.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::Provider;

    #[tokio::test]
    async fn message_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("state.wal");
        let archive_dir = dir.path().join("archive");
        {
            let adapter = FileStorageAdapter::open(&wal_path, &archive_dir).unwrap();
            adapter
                .append_worktree_message("main", ChatMessage::user("m1", "hi", Provider::Codex, 1))
                .await
                .unwrap();
        }
        let adapter = FileStorageAdapter::open(&wal_path, &archive_dir).unwrap();
        let messages = adapter.load_worktree_messages("main").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[tokio::test]
    async fn append_worktree_message_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter =
            FileStorageAdapter::open(dir.path().join("state.wal"), dir.path().join("archive")).unwrap();
        let msg = ChatMessage::user("m1", "hi", Provider::Codex, 1);
        adapter.append_worktree_message("main", msg.clone()).await.unwrap();
        adapter.append_worktree_message("main", msg).await.unwrap();
        assert_eq!(adapter.load_worktree_messages("main").await.unwrap().len(), 1);
    }
}
