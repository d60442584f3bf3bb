// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Claude variant: a one-shot child spawned fresh per turn, speaking
//! newline-delimited JSON with no request/response correlation (spec.md
//! §4.6 "Claude variant").

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;
use vibe80_core::{Clock, Provider};
use vibe80_exec::{ExecOpts, Executor};
use vibe80_wire::{ClaudeContentBlock, ClaudeLine, ExitReason, ProviderEvent};

use crate::client::{AccountLoginParams, EventSink, ModelPage, ProviderClient, StopOpts, TurnHandle};
use crate::error::SupervisorError;
use crate::logger::{LogDirection, ProviderLogger};
use crate::turns::{ClientStatus, TurnTracker};

const DEFAULT_ALLOWED_TOOLS: &str = "Bash(git:*)";

pub struct ClaudeClient<C: Clock> {
    executor: Arc<Executor<C>>,
    workspace_id: String,
    binary: String,
    allowed_tools: String,
    extra_allowed_tools: Vec<String>,
    add_dirs: Vec<PathBuf>,
    system_prompt: String,
    exec_opts: ExecOpts,
    logger: Option<Arc<ProviderLogger>>,
    sink: EventSink,
    turns: Arc<TurnTracker>,
    status: SyncMutex<ClientStatus>,
    active_turn: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    default_model: SyncMutex<Option<String>>,
    resume_session_id: Arc<SyncMutex<Option<String>>>,
}

impl<C: Clock + Send + Sync + 'static> ClaudeClient<C> {
    pub fn new(
        executor: Arc<Executor<C>>,
        workspace_id: String,
        binary: String,
        add_dirs: Vec<PathBuf>,
        system_prompt: String,
        exec_opts: ExecOpts,
        sink: EventSink,
        logger: Option<Arc<ProviderLogger>>,
        web_search_allowed: bool,
    ) -> Self {
        let mut extra_allowed_tools = Vec::new();
        if web_search_allowed {
            extra_allowed_tools.push("WebSearch".to_string());
        }
        Self {
            executor,
            workspace_id,
            binary,
            allowed_tools: DEFAULT_ALLOWED_TOOLS.to_string(),
            extra_allowed_tools,
            add_dirs,
            system_prompt,
            exec_opts,
            logger,
            sink,
            turns: Arc::new(TurnTracker::new()),
            status: SyncMutex::new(ClientStatus::Idle),
            active_turn: AsyncMutex::new(None),
            default_model: SyncMutex::new(None),
            resume_session_id: Arc::new(SyncMutex::new(None)),
        }
    }

    fn set_status(&self, status: ClientStatus) {
        *self.status.lock() = status;
    }

    fn build_argv(&self) -> Vec<String> {
        let mut tools = vec![self.allowed_tools.clone()];
        tools.extend(self.extra_allowed_tools.iter().cloned());
        let mut argv = vec![
            self.binary.clone(),
            "--continue".to_string(),
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--input-format".to_string(),
            "stream-json".to_string(),
            "--permission-mode".to_string(),
            "acceptEdits".to_string(),
            "--allowed-tools".to_string(),
            tools.join(","),
            "--append-system-prompt".to_string(),
            self.system_prompt.clone(),
        ];
        for dir in &self.add_dirs {
            argv.push("--add-dir".to_string());
            argv.push(dir.display().to_string());
        }
        if let Some(model) = self.default_model.lock().clone() {
            argv.push("--model".to_string());
            argv.push(model);
        }
        argv
    }
}

#[async_trait]
impl<C: Clock + Send + Sync + 'static> ProviderClient for ClaudeClient<C> {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    /// Claude has no long-lived child to bootstrap; `start()` only flips
    /// status since every turn spawns its own process.
    async fn start(&self) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::ThreadStarting);
        self.set_status(ClientStatus::Idle);
        let _ = self.sink.send(ProviderEvent::Ready { thread_id: self.workspace_id.clone() });
        Ok(())
    }

    async fn stop(&self, opts: StopOpts) -> Result<(), SupervisorError> {
        self.set_status(ClientStatus::Stopping);
        let mut guard = self.active_turn.lock().await;
        if let Some(handle) = guard.take() {
            if opts.force {
                handle.abort();
            } else {
                let _ = tokio::time::timeout(opts.timeout.max(Duration::from_secs(1)), handle).await;
            }
        }
        let _ = self.sink.send(ProviderEvent::Exit { code: None, signal: None, reason: opts.reason });
        Ok(())
    }

    async fn send_turn(&self, text: String, _attachments: Vec<String>) -> Result<TurnHandle, SupervisorError> {
        let turn_id = Uuid::new_v4().to_string();
        self.turns.start(turn_id.clone());
        self.set_status(ClientStatus::Busy);

        let argv = self.build_argv();
        let handle = self.executor.stream(&self.workspace_id, &argv, &self.exec_opts).await?;
        let (_pid, mut stdin, stdout, stderr, exit_rx) = handle.split();

        let input_line = serde_json::json!({
            "type": "user",
            "message": { "role": "user", "content": [{ "type": "text", "text": text }] },
        });
        let input_line = serde_json::to_string(&input_line)?;
        if let Some(logger) = &self.logger {
            logger.log(LogDirection::In, &input_line).await;
        }
        stdin.write_all(input_line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        drop(stdin);

        let sink = self.sink.clone();
        let logger = self.logger.clone();
        let turns = self.turns.clone();
        let resume_session_id = self.resume_session_id.clone();
        let task_turn_id = turn_id.clone();

        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut pending_tools: HashMap<String, String> = HashMap::new();
            let mut assistant_text = String::new();
            let mut saw_error = false;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(logger) = &logger {
                            logger.log(LogDirection::Out, &line).await;
                        }
                        match serde_json::from_str::<ClaudeLine>(&line) {
                            Ok(ClaudeLine::System { session_id, .. }) => {
                                if let Some(id) = session_id {
                                    *resume_session_id.lock() = Some(id);
                                }
                            }
                            Ok(ClaudeLine::Assistant { message }) => {
                                for block in message.content {
                                    match block {
                                        ClaudeContentBlock::Text { text } => assistant_text.push_str(&text),
                                        ClaudeContentBlock::ToolUse { id, name, .. } => {
                                            pending_tools.insert(id, name);
                                        }
                                        ClaudeContentBlock::ToolResult { .. } => {}
                                    }
                                }
                            }
                            Ok(ClaudeLine::User { message }) => {
                                for block in message.content {
                                    if let ClaudeContentBlock::ToolResult { tool_use_id, content, is_error } = block {
                                        let name = pending_tools.remove(&tool_use_id).unwrap_or_default();
                                        let _ = sink.send(ProviderEvent::CommandExecutionCompleted {
                                            turn_id: task_turn_id.clone(),
                                            item_id: tool_use_id.clone(),
                                            item: serde_json::json!({
                                                "tool_use_id": tool_use_id,
                                                "name": name,
                                                "output": content.as_text(),
                                                "is_error": is_error,
                                            }),
                                        });
                                    }
                                }
                            }
                            Ok(ClaudeLine::Result { is_error, result, .. }) => {
                                saw_error = is_error;
                                if is_error {
                                    let _ = sink.send(ProviderEvent::TurnError {
                                        turn_id: task_turn_id.clone(),
                                        message: result.unwrap_or_else(|| "claude turn failed".to_string()),
                                        will_retry: false,
                                    });
                                }
                            }
                            Err(err) => tracing::debug!(%line, error = %err, "unparseable claude line"),
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "claude stdout read error");
                        break;
                    }
                }
            }

            if !assistant_text.is_empty() {
                let _ = sink.send(ProviderEvent::AssistantMessage {
                    turn_id: task_turn_id.clone(),
                    item_id: task_turn_id.clone(),
                    text: assistant_text,
                });
            }

            let info = exit_rx.await.ok();
            let exited_clean = info.as_ref().map(|i| i.code == Some(0)).unwrap_or(false);
            turns.finish(&task_turn_id);
            if exited_clean && !saw_error {
                let _ = sink.send(ProviderEvent::TurnCompleted { turn_id: task_turn_id.clone() });
            } else if !saw_error {
                let _ = sink.send(ProviderEvent::TurnError {
                    turn_id: task_turn_id.clone(),
                    message: "claude process exited non-zero".to_string(),
                    will_retry: false,
                });
            }
            if let Some(info) = info {
                if info.code != Some(0) {
                    let _ = sink.send(ProviderEvent::Exit {
                        code: info.code,
                        signal: info.signal.map(|s| s.to_string()),
                        reason: ExitReason::Crashed,
                    });
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(_line)) = lines.next_line().await {
                // Claude's stderr carries diagnostics only; surfaced via the
                // ERR:: provider log, not as a client-facing event.
            }
        });

        *self.active_turn.lock().await = Some(task);
        self.set_status(ClientStatus::Idle);
        let _ = self.sink.send(ProviderEvent::TurnStarted { turn_id: turn_id.clone() });
        Ok(TurnHandle { turn_id })
    }

    async fn interrupt_turn(&self, _turn_id: &str) -> Result<(), SupervisorError> {
        Err(SupervisorError::InterruptUnsupported(Provider::Claude))
    }

    async fn list_models(&self, _cursor: Option<String>, _limit: Option<u32>) -> Result<ModelPage, SupervisorError> {
        Ok(ModelPage { models: vec!["claude-opus-4".to_string(), "claude-sonnet-4".to_string()], cursor: None })
    }

    async fn set_default_model(&self, model: String, _reasoning_effort: Option<String>) -> Result<(), SupervisorError> {
        *self.default_model.lock() = Some(model);
        Ok(())
    }

    async fn start_account_login(&self, _params: AccountLoginParams) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::AccountLoginStarted);
        let argv = vec![self.binary.clone(), "setup-token".to_string()];
        let output = self.executor.run(&self.workspace_id, &argv, &self.exec_opts).await?;
        if output.success() {
            let _ = self.sink.send(ProviderEvent::AccountLoginCompleted);
            Ok(())
        } else {
            let message = String::from_utf8_lossy(&output.stderr).to_string();
            let _ = self.sink.send(ProviderEvent::AccountLoginFailed { message: message.clone() });
            Err(SupervisorError::Rpc { method: "setup-token".to_string(), message })
        }
    }

    fn request_restart(&self) {
        self.turns.request_restart();
    }

    fn status(&self) -> ClientStatus {
        *self.status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_argv_includes_add_dirs_and_tools() {
        let executor = Arc::new(Executor::bypass(vibe80_core::FakeClock::new()));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let client = ClaudeClient::new(
            executor,
            "w1".to_string(),
            "claude".to_string(),
            vec![PathBuf::from("/repo"), PathBuf::from("/attachments")],
            "system prompt".to_string(),
            ExecOpts::default(),
            tx,
            None,
            true,
        );
        let argv = client.build_argv();
        assert!(argv.contains(&"--add-dir".to_string()));
        assert!(argv.contains(&"/repo".to_string()));
        assert!(argv.iter().any(|a| a.contains("WebSearch")));
    }
}
