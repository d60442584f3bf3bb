// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory, single-use handoff and mono-auth tokens (spec.md §4.3). Both
//! are swept periodically by the caller's GC loop (C9); neither is ever
//! persisted to the [`vibe80_storage::StorageAdapter`].

use crate::access::random_hex;
use crate::error::AuthError;
use parking_lot::Mutex;
use std::collections::HashMap;
use vibe80_core::{HandoffToken, MonoAuthToken, SessionId, WorkspaceId};

#[derive(Default)]
pub struct HandoffRegistry {
    handoff: Mutex<HashMap<String, HandoffToken>>,
    mono: Mutex<HashMap<String, MonoAuthToken>>,
}

impl HandoffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint_handoff(
        &self,
        workspace_id: WorkspaceId,
        session_id: Option<SessionId>,
        now_ms: u64,
        ttl_ms: u64,
    ) -> HandoffToken {
        let token = HandoffToken {
            token: random_hex(24),
            workspace_id,
            session_id,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + ttl_ms,
            used_at_ms: None,
        };
        self.handoff.lock().insert(token.token.clone(), token.clone());
        token
    }

    /// Removes and returns the token atomically, so a concurrent second
    /// presentation of the same token always sees it missing.
    pub fn consume_handoff(&self, token: &str, now_ms: u64) -> Result<HandoffToken, AuthError> {
        let entry = self.handoff.lock().remove(token).ok_or(AuthError::HandoffInvalid)?;
        if entry.is_expired(now_ms) {
            return Err(AuthError::HandoffExpired);
        }
        Ok(entry)
    }

    pub fn mint_mono(&self, workspace_id: WorkspaceId, now_ms: u64, ttl_ms: u64) -> MonoAuthToken {
        let token = MonoAuthToken {
            token: random_hex(24),
            workspace_id,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + ttl_ms,
            used_at_ms: None,
        };
        self.mono.lock().insert(token.token.clone(), token.clone());
        token
    }

    pub fn consume_mono(&self, token: &str, now_ms: u64) -> Result<MonoAuthToken, AuthError> {
        let entry = self.mono.lock().remove(token).ok_or(AuthError::MonoInvalid)?;
        if entry.is_expired(now_ms) {
            return Err(AuthError::MonoExpired);
        }
        Ok(entry)
    }

    /// Drops expired-but-never-consumed entries so the maps don't grow
    /// without bound (spec.md §4.3 "both are in-memory, swept periodically").
    pub fn sweep(&self, now_ms: u64) {
        self.handoff.lock().retain(|_, t| !t.is_expired(now_ms));
        self.mono.lock().retain(|_, t| !t.is_expired(now_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_token_is_single_use() {
        let registry = HandoffRegistry::new();
        let token = registry.mint_handoff(WorkspaceId::generate(), None, 0, 1_000);
        registry.consume_handoff(&token.token, 10).unwrap();
        assert!(matches!(
            registry.consume_handoff(&token.token, 10),
            Err(AuthError::HandoffInvalid)
        ));
    }

    #[test]
    fn expired_handoff_token_is_rejected() {
        let registry = HandoffRegistry::new();
        let token = registry.mint_handoff(WorkspaceId::generate(), None, 0, 1_000);
        assert!(matches!(
            registry.consume_handoff(&token.token, 2_000),
            Err(AuthError::HandoffExpired)
        ));
    }

    #[test]
    fn sweep_drops_expired_entries_only() {
        let registry = HandoffRegistry::new();
        let expired = registry.mint_handoff(WorkspaceId::generate(), None, 0, 1_000);
        let live = registry.mint_handoff(WorkspaceId::generate(), None, 0, 10_000);
        registry.sweep(2_000);
        assert!(registry.consume_handoff(&expired.token, 2_000).is_err());
        assert!(registry.consume_handoff(&live.token, 2_000).is_ok());
    }
}
