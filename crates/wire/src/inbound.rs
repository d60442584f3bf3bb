// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client → daemon envelopes accepted by the Streaming Fan-out (C8) and
//! dispatched by the API Surface (C10). Routing table: spec.md §4.8.

use serde::{Deserialize, Serialize};
use vibe80_core::Provider;

/// One inbound frame on the `/chat?token=...&session=...` duplex channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEnvelope {
    /// Replied to with `pong`, sender only.
    Ping,

    /// Send a user turn to a worktree's provider client.
    #[serde(alias = "worktree_send_message")]
    UserMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        text: String,
        #[serde(default)]
        attachments: Vec<String>,
    },

    /// Reply with messages since `last_seen_message_id` plus current status.
    WorktreeMessagesSync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen_message_id: Option<String>,
    },

    /// Interrupt an in-flight turn (Codex only — see `Provider::supports_interrupt`).
    TurnInterrupt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        turn_id: String,
    },

    /// Start the other provider for a worktree if needed, make it active.
    SwitchProvider {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        provider: Provider,
    },

    ModelList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },

    ModelSet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_effort: Option<String>,
    },

    AccountLoginStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        provider: Provider,
    },

    /// Only honored when `ALLOW_RUN_SLASH_COMMAND`/`ALLOW_GIT_SLASH_COMMAND`
    /// enable the requested `kind`.
    ActionRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_id: Option<String>,
        kind: ActionKind,
        command: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Run,
    Git,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_accepts_legacy_alias() {
        let json = r#"{"type":"worktree_send_message","text":"hi"}"#;
        let env: InboundEnvelope = serde_json::from_str(json).unwrap();
        assert!(matches!(env, InboundEnvelope::UserMessage { text, .. } if text == "hi"));
    }

    #[test]
    fn ping_round_trips() {
        let json = serde_json::to_string(&InboundEnvelope::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
        let decoded: InboundEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, InboundEnvelope::Ping);
    }
}
