// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat messages persisted to a worktree's append-only message log.

use crate::provider::Provider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub output: String,
    pub success: bool,
}

/// One entry in a worktree's append-only message log (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub provider: Provider,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, text: impl Into<String>, provider: Provider, timestamp_ms: u64) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            text: text.into(),
            provider,
            timestamp_ms,
            attachments: Vec::new(),
            tool_result: None,
            command: None,
            output: None,
            status: None,
        }
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>, provider: Provider, timestamp_ms: u64) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            text: text.into(),
            provider,
            timestamp_ms,
            attachments: Vec::new(),
            tool_result: None,
            command: None,
            output: None,
            status: Some(MessageStatus::Completed),
        }
    }
}
