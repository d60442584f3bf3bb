// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NDJSON line shapes for the Claude one-shot-per-turn variant (spec.md
//! §4.6). Unlike Codex's long-lived JSON-RPC child, each turn spawns a fresh
//! process and its stdout is a stream of newline-delimited `ClaudeLine`
//! values ending in a `result` line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeLine {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        message: ClaudeAssistantMessage,
    },
    User {
        message: ClaudeUserMessage,
    },
    Result {
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeAssistantMessage {
    #[serde(default)]
    pub content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeUserMessage {
    #[serde(default)]
    pub content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ClaudeToolResultContent,
        #[serde(default)]
        is_error: bool,
    },
}

/// `tool_result.content` is either a plain string or a list of text blocks
/// depending on the tool; normalize both to a string for `ChatMessage`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum ClaudeToolResultContent {
    #[default]
    Empty,
    Text(String),
    Blocks(Vec<ClaudeTextBlock>),
}

impl ClaudeToolResultContent {
    pub fn as_text(&self) -> String {
        match self {
            ClaudeToolResultContent::Empty => String::new(),
            ClaudeToolResultContent::Text(s) => s.clone(),
            ClaudeToolResultContent::Blocks(blocks) => {
                blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("")
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeTextBlock {
    #[serde(default)]
    pub text: String,
}

/// The single-shot CLI invocation arguments the supervisor constructs per
/// turn (`--print --output-format stream-json`, spec.md §4.6).
#[derive(Debug, Clone, Serialize)]
pub struct ClaudeTurnRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_assistant_text_block() {
        let json = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#;
        let line: ClaudeLine = serde_json::from_str(json).unwrap();
        match line {
            ClaudeLine::Assistant { message } => match &message.content[0] {
                ClaudeContentBlock::Text { text } => assert_eq!(text, "hi"),
                _ => panic!("expected text block"),
            },
            _ => panic!("expected assistant line"),
        }
    }

    #[test]
    fn tool_result_content_normalizes_blocks_to_text() {
        let json = r#"{"type":"tool_result","tool_use_id":"c1","content":[{"text":"ok"}]}"#;
        let block: ClaudeContentBlock = serde_json::from_str(json).unwrap();
        match block {
            ClaudeContentBlock::ToolResult { content, .. } => assert_eq!(content.as_text(), "ok"),
            _ => panic!("expected tool_result block"),
        }
    }

    #[test]
    fn result_line_carries_is_error() {
        let json = r#"{"type":"result","is_error":true,"result":"boom"}"#;
        let line: ClaudeLine = serde_json::from_str(json).unwrap();
        match line {
            ClaudeLine::Result { is_error, result, .. } => {
                assert!(is_error);
                assert_eq!(result.as_deref(), Some("boom"));
            }
            _ => panic!("expected result line"),
        }
    }
}
