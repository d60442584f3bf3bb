// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Wire protocol types shared by the Streaming Fan-out (C8), API Surface
//! (C10), and Provider Client Supervisor (C6): client/daemon envelopes plus
//! the two provider subprocess line formats.

mod claude;
mod codex;
mod error_code;
mod inbound;
mod outbound;

pub use claude::{
    ClaudeAssistantMessage, ClaudeContentBlock, ClaudeLine, ClaudeTextBlock, ClaudeToolResultContent,
    ClaudeTurnRequest, ClaudeUserMessage,
};
pub use codex::{JsonRpcError, JsonRpcLine, JsonRpcRequest, KnownNotification};
pub use error_code::{http_error_code, ErrorCode};
pub use inbound::{ActionKind, InboundEnvelope};
pub use outbound::{ExitReason, OutboundEnvelope, ProviderEvent};
