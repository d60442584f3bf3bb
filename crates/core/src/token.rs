// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data shapes for refresh-token and one-shot handoff/mono-auth tokens.
//! Minting, verification, and rotation logic lives in `vibe80-auth`; this
//! crate only defines what gets persisted / held in memory.

use crate::id::{SessionId, WorkspaceId};
use serde::{Deserialize, Serialize};

/// Durable per-workspace refresh-token state (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub workspace_id: WorkspaceId,
    pub current_token_hash: String,
    pub current_expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_token_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_valid_until_ms: Option<u64>,
}

/// In-memory, single-use, short-TTL bearer exchanged for a fresh
/// `(access, refresh)` pair bound to a specific session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffToken {
    pub token: String,
    pub workspace_id: WorkspaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at_ms: Option<u64>,
}

impl HandoffToken {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_used(&self) -> bool {
        self.used_at_ms.is_some()
    }
}

/// Single-tenant short-circuit login token. Same shape and lifecycle rules
/// as [`HandoffToken`] but never bound to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonoAuthToken {
    pub token: String,
    pub workspace_id: WorkspaceId,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at_ms: Option<u64>,
}

impl MonoAuthToken {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_used(&self) -> bool {
        self.used_at_ms.is_some()
    }
}
