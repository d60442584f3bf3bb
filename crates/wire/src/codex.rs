// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-framed JSON-RPC 2.0 wire shapes for the Codex app-server variant
//! (spec.md §4.6). The core only frames and routes these — it never
//! interprets `params`/`result` payloads beyond what's needed to translate
//! known notifications into [`crate::ProviderEvent`]s.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self { jsonrpc: "2.0", id, method: method.into(), params }
    }
}

/// A decoded line from the child's stdout: either a response to a pending
/// request (has `id`) or a notification (no `id`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcLine {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcLine {
    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.method.is_none()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The notification methods the supervisor recognizes (spec.md §4.6 table).
/// Anything else degrades to a `log` event (§9 "dynamic-typed events").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownNotification {
    ThreadStarted,
    AgentMessageDelta,
    CommandExecutionOutputDelta,
    ItemCompletedAgentMessage,
    ItemCompletedCommandExecution,
    TurnStarted,
    TurnCompleted,
    Error,
    AccountLoginCompleted,
}

impl KnownNotification {
    /// Classify a `(method, params)` pair. `item/completed` requires peeking
    /// at `params.item.item_type` to tell an agent message from a command
    /// execution.
    pub fn classify(method: &str, params: Option<&serde_json::Value>) -> Option<Self> {
        match method {
            "thread/started" => Some(Self::ThreadStarted),
            "item/agentMessage/delta" => Some(Self::AgentMessageDelta),
            "item/commandExecution/outputDelta" => Some(Self::CommandExecutionOutputDelta),
            "item/completed" => {
                let item_type = params.and_then(|p| p.get("item")).and_then(|i| i.get("item_type")).and_then(|t| t.as_str());
                match item_type {
                    Some("agentMessage") => Some(Self::ItemCompletedAgentMessage),
                    Some("commandExecution") => Some(Self::ItemCompletedCommandExecution),
                    _ => None,
                }
            }
            "turn/started" => Some(Self::TurnStarted),
            "turn/completed" => Some(Self::TurnCompleted),
            "error" => Some(Self::Error),
            "account/login/completed" => Some(Self::AccountLoginCompleted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_item_completed_by_item_type() {
        let params = json!({"item": {"item_type": "agentMessage"}});
        assert_eq!(
            KnownNotification::classify("item/completed", Some(&params)),
            Some(KnownNotification::ItemCompletedAgentMessage)
        );
    }

    #[test]
    fn unknown_method_classifies_to_none() {
        assert_eq!(KnownNotification::classify("item/unknown", None), None);
    }

    #[test]
    fn response_vs_notification_discriminated_by_id_and_method() {
        let response: JsonRpcLine = serde_json::from_str(r#"{"id":1,"result":{}}"#).unwrap();
        assert!(response.is_response());
        let notification: JsonRpcLine =
            serde_json::from_str(r#"{"method":"turn/started","params":{}}"#).unwrap();
        assert!(notification.is_notification());
    }
}
