// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon → client envelopes broadcast by the Streaming Fan-out (C8).
//!
//! Every agent-emitted event from the Provider Client Supervisor (C6) is
//! wrapped in [`OutboundEnvelope::Worktree`] with a `worktreeId` (defaulting
//! to `"main"`, spec.md §4.8) before being written to every open socket.

use crate::error_code::ErrorCode;
use serde::{Deserialize, Serialize};
use vibe80_core::{ChatMessage, Provider, WorktreeStatus};

/// The per-turn / per-child events a `ProviderClient` emits (spec.md §4.6
/// "Events emitted"). Shared by both the Codex and Claude variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    ThreadStarting,
    Ready {
        thread_id: String,
    },
    AssistantDelta {
        turn_id: String,
        item_id: String,
        delta: String,
    },
    AssistantMessage {
        turn_id: String,
        item_id: String,
        text: String,
    },
    CommandExecutionDelta {
        turn_id: String,
        item_id: String,
        delta: String,
    },
    CommandExecutionCompleted {
        turn_id: String,
        item_id: String,
        item: serde_json::Value,
    },
    TurnStarted {
        turn_id: String,
    },
    TurnCompleted {
        turn_id: String,
    },
    TurnError {
        turn_id: String,
        message: String,
        will_retry: bool,
    },
    Log {
        message: String,
    },
    RpcIn {
        payload: serde_json::Value,
    },
    RpcOut {
        payload: serde_json::Value,
    },
    Exit {
        code: Option<i32>,
        signal: Option<String>,
        reason: ExitReason,
    },
    AccountLoginStarted,
    AccountLoginCompleted,
    AccountLoginFailed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Requested,
    Crashed,
    GcIdle,
}

/// Envelopes written to streaming clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEnvelope {
    Pong,

    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },

    /// A provider event, addressed to a specific worktree.
    Worktree {
        worktree_id: String,
        event: ProviderEvent,
    },

    WorktreeStatus {
        worktree_id: String,
        status: WorktreeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },

    WorktreeMessagesSync {
        worktree_id: String,
        messages: Vec<ChatMessage>,
        status: WorktreeStatus,
    },

    ProviderSwitched {
        worktree_id: String,
        provider: Provider,
        messages: Vec<ChatMessage>,
        models: Vec<String>,
    },

    TurnStartedAck {
        worktree_id: String,
        turn_id: String,
    },

    ModelList {
        worktree_id: String,
        models: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<String>,
    },
}

impl OutboundEnvelope {
    /// Wrap a provider event for a worktree, defaulting to `"main"` per
    /// §4.8 when the caller has no explicit worktree context.
    pub fn for_worktree(worktree_id: impl Into<Option<String>>, event: ProviderEvent) -> Self {
        OutboundEnvelope::Worktree {
            worktree_id: worktree_id.into().unwrap_or_else(|| "main".to_string()),
            event,
        }
    }

    pub fn error(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        OutboundEnvelope::Error { message: message.into(), error_code: code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worktree_envelope_flattens_event_fields() {
        let env = OutboundEnvelope::for_worktree(
            None,
            ProviderEvent::TurnStarted { turn_id: "t1".into() },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["worktree_id"], "main");
        assert_eq!(json["type"], "worktree");
        assert_eq!(json["event"]["type"], "turn_started");
        assert_eq!(json["event"]["turn_id"], "t1");
    }

    #[test]
    fn error_envelope_round_trips_without_code() {
        let env = OutboundEnvelope::error("Unknown session.", None);
        let json = serde_json::to_string(&env).unwrap();
        let decoded: OutboundEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, env);
    }
}
