// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session & Worktree State (C7): an ensured-loaded-on-first-use, in-memory
//! registry backed by write-through persistence to the Storage Adapter.
//!
//! Every mutation for a session — message append, worktree status change,
//! active-provider swap, socket-set change — takes the same per-session
//! `tokio::sync::Mutex`, giving the "one mutation lane per session"
//! guarantee spec.md §5 requires without a separate actor/queue per
//! session (grounded on the donor's `Arc<Mutex<MaterializedState>>`
//! single-writer pattern in `daemon_old::lifecycle::DaemonState`).

use std::collections::HashMap;
use std::sync::Arc;

use vibe80_core::{ConnId, Session, SessionId, SessionRuntime, Worktree, WorktreeId};
use vibe80_storage::StorageAdapter;
use vibe80_supervisor::ProviderClient;

use crate::error::DaemonError;

/// Everything about a session that must change atomically with everything
/// else about that session.
pub struct SessionState {
    pub session: Session,
    pub worktrees: HashMap<WorktreeId, Worktree>,
    pub runtime: SessionRuntime<Arc<dyn ProviderClient>>,
}

impl SessionState {
    pub fn worktree(&self, id: &WorktreeId) -> Result<&Worktree, DaemonError> {
        self.worktrees.get(id).ok_or(DaemonError::WorktreeNotFound)
    }

    pub fn worktree_mut(&mut self, id: &WorktreeId) -> Result<&mut Worktree, DaemonError> {
        self.worktrees.get_mut(id).ok_or(DaemonError::WorktreeNotFound)
    }
}

/// The per-session mutation lane. Held across `.await` points deliberately
/// — a held lane serializes concurrent frames for the same session, which
/// is the point (spec.md §5 "lane briefly releases for I/O").
pub struct SessionHandle {
    pub lane: tokio::sync::Mutex<SessionState>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    fn new(session: Session, worktrees: HashMap<WorktreeId, Worktree>) -> Self {
        Self { lane: tokio::sync::Mutex::new(SessionState { session, worktrees, runtime: SessionRuntime::new() }) }
    }
}

/// Process-wide `sessionId -> SessionRuntime` registry (spec.md §4.7).
pub struct SessionRegistry {
    storage: Arc<dyn StorageAdapter>,
    handles: parking_lot::Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage, handles: parking_lot::Mutex::new(HashMap::new()) }
    }

    /// Returns the already-loaded handle without touching storage, for
    /// callers (GC) that only want to act on sessions already resident.
    pub fn get_loaded(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.handles.lock().get(session_id).cloned()
    }

    pub fn loaded_ids(&self) -> Vec<SessionId> {
        self.handles.lock().keys().cloned().collect()
    }

    /// Ensures `session_id` is resident in memory, loading it from C2 on
    /// first use (spec.md §4.7).
    pub async fn ensure_loaded(&self, session_id: &SessionId) -> Result<Arc<SessionHandle>, DaemonError> {
        if let Some(handle) = self.get_loaded(session_id) {
            return Ok(handle);
        }
        let session = self
            .storage
            .get_session(session_id.as_str())
            .await?
            .ok_or(DaemonError::SessionNotFound)?;
        let worktrees = self
            .storage
            .load_worktrees(session_id.as_str())
            .await?
            .into_iter()
            .map(|wt| (wt.id.clone(), wt))
            .collect();
        let handle = Arc::new(SessionHandle::new(session, worktrees));
        let mut guard = self.handles.lock();
        Ok(guard.entry(session_id.clone()).or_insert(handle).clone())
    }

    /// Removes a session from the in-memory registry. The caller is
    /// responsible for stopping its children and closing its sockets
    /// first (spec.md §4.9 "evicting entails...").
    pub fn evict(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.handles.lock().remove(session_id)
    }

    pub async fn touch(&self, handle: &SessionHandle, now_ms: u64) -> Result<(), DaemonError> {
        let mut state = handle.lane.lock().await;
        state.session.touch(now_ms);
        self.storage.save_session(state.session.clone()).await?;
        Ok(())
    }

    /// `appendMessage(session, worktreeId|null, msg)` (spec.md §4.7):
    /// resolves `null|"main"` to the main worktree and persists
    /// write-through.
    pub async fn append_message(
        &self,
        worktree_id: Option<&str>,
        message: vibe80_core::ChatMessage,
    ) -> Result<WorktreeId, DaemonError> {
        let worktree_id = WorktreeId::resolve(worktree_id).map_err(|_| DaemonError::WorktreeNotFound)?;
        self.storage.append_worktree_message(worktree_id.as_str(), message).await?;
        Ok(worktree_id)
    }

    pub async fn messages_since(
        &self,
        worktree_id: &WorktreeId,
        last_seen_message_id: Option<&str>,
    ) -> Result<Vec<vibe80_core::ChatMessage>, DaemonError> {
        let all = self.storage.load_worktree_messages(worktree_id.as_str()).await?;
        Ok(match last_seen_message_id {
            None => all,
            Some(last_id) => match all.iter().position(|m| m.id == last_id) {
                Some(idx) => all.into_iter().skip(idx + 1).collect(),
                None => all,
            },
        })
    }

    pub async fn save_worktree(&self, session_id: &SessionId, worktree: Worktree) -> Result<(), DaemonError> {
        self.storage.save_worktree(session_id.as_str(), worktree).await?;
        Ok(())
    }

    pub fn register_socket(&self, state: &mut SessionState, conn: ConnId) {
        state.runtime.register_socket(conn);
    }

    pub fn remove_socket(&self, state: &mut SessionState, conn: ConnId) {
        state.runtime.remove_socket(conn);
    }
}
