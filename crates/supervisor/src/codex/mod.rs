// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Codex variant: a long-lived JSON-RPC 2.0 app-server child, one per
//! worktree, correlated by request id (spec.md §4.6).

mod protocol;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use parking_lot::Mutex as SyncMutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::ChildStdin;
use tokio::sync::Mutex as AsyncMutex;
use vibe80_core::{Clock, Provider};
use vibe80_exec::{ExecOpts, ExitInfo, Executor};
use vibe80_wire::{ExitReason, JsonRpcError, JsonRpcLine, JsonRpcRequest, KnownNotification, ProviderEvent};

use crate::client::{AccountLoginParams, EventSink, ModelPage, ProviderClient, StopOpts, TurnHandle};
use crate::error::SupervisorError;
use crate::logger::{LogDirection, ProviderLogger};
use crate::turns::{ClientStatus, TurnTracker};
use protocol::PromiseMap;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct Running {
    pid: u32,
    stdin: ChildStdin,
    reader_task: tokio::task::JoinHandle<()>,
    watcher_task: tokio::task::JoinHandle<()>,
}

pub struct CodexClient<C: Clock> {
    executor: Arc<Executor<C>>,
    workspace_id: String,
    argv: Vec<String>,
    exec_opts: ExecOpts,
    logger: Option<Arc<ProviderLogger>>,
    sink: EventSink,
    turns: Arc<TurnTracker>,
    promises: Arc<PromiseMap>,
    thread_id: Arc<SyncMutex<Option<String>>>,
    status: SyncMutex<ClientStatus>,
    running: AsyncMutex<Option<Running>>,
    resume_thread_id: Option<String>,
    base_instructions: Option<String>,
    expected_exit_reason: Arc<SyncMutex<Option<ExitReason>>>,
}

impl<C: Clock + Send + Sync + 'static> CodexClient<C> {
    pub fn new(
        executor: Arc<Executor<C>>,
        workspace_id: String,
        binary: String,
        exec_opts: ExecOpts,
        sink: EventSink,
        logger: Option<Arc<ProviderLogger>>,
        resume_thread_id: Option<String>,
        base_instructions: Option<String>,
    ) -> Self {
        let argv = vec![binary, "app-server".to_string()];
        Self {
            executor,
            workspace_id,
            argv,
            exec_opts,
            logger,
            sink,
            turns: Arc::new(TurnTracker::new()),
            promises: Arc::new(PromiseMap::new()),
            thread_id: Arc::new(SyncMutex::new(None)),
            status: SyncMutex::new(ClientStatus::Starting),
            running: AsyncMutex::new(None),
            resume_thread_id,
            base_instructions,
            expected_exit_reason: Arc::new(SyncMutex::new(None)),
        }
    }

    fn set_status(&self, status: ClientStatus) {
        *self.status.lock() = status;
    }

    /// The sandbox/approval params every bootstrap RPC carries (spec.md
    /// §4.6: "both passing `sandbox_workspace_write.{writable_roots,
    /// network_access}`, `web_search`, `baseInstructions`,
    /// `approvalPolicy:"never"`, and `sandbox` mode selected by the
    /// isolation toggles").
    fn bootstrap_params(&self) -> serde_json::Value {
        let (writable_roots, network_access, mode): (Vec<String>, bool, &str) = match &self.exec_opts.sandbox {
            Some(policy) => {
                let mut roots = vec![
                    policy.repo_dir.display().to_string(),
                    policy.tmp_dir.display().to_string(),
                    policy.attachments_dir.display().to_string(),
                ];
                roots.extend(policy.extra_allow_rw.iter().map(|p| p.display().to_string()));
                (roots, policy.internet_access, "workspace-write")
            }
            None => (vec![], true, "danger-full-access"),
        };
        serde_json::json!({
            "sandbox": mode,
            "sandbox_workspace_write": {
                "writable_roots": writable_roots,
                "network_access": network_access,
            },
            "web_search": network_access,
            "baseInstructions": self.base_instructions,
            "approvalPolicy": "never",
        })
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, SupervisorError> {
        let (id, rx) = self.promises.register();
        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)?;
        self.write_line(&line).await?;

        match tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(JsonRpcError { message, .. }))) => {
                Err(SupervisorError::Rpc { method: method.to_string(), message })
            }
            Ok(Err(_)) => Err(SupervisorError::ChildExited { method: method.to_string() }),
            Err(_) => Err(SupervisorError::Timeout { method: method.to_string() }),
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), SupervisorError> {
        let mut guard = self.running.lock().await;
        let running = guard.as_mut().ok_or(SupervisorError::NotStarted)?;
        running.stdin.write_all(line.as_bytes()).await?;
        running.stdin.write_all(b"\n").await?;
        running.stdin.flush().await?;
        if let Some(logger) = &self.logger {
            logger.log(LogDirection::In, line).await;
        }
        let _ = self.sink.send(ProviderEvent::RpcIn {
            payload: serde_json::from_str(line).unwrap_or(serde_json::Value::Null),
        });
        Ok(())
    }
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

/// Translates a classified notification into the shared [`ProviderEvent`]
/// shape (spec.md §4.6 table). Degrades to `Log` for anything the table
/// doesn't name, per §9 "dynamic-typed events". Free function (not a
/// method) so the reader task can call it without holding `&CodexClient`.
fn translate_notification(
    method: &str,
    params: Option<serde_json::Value>,
    turns: &TurnTracker,
    thread_id: &SyncMutex<Option<String>>,
) -> ProviderEvent {
    let Some(known) = KnownNotification::classify(method, params.as_ref()) else {
        return ProviderEvent::Log { message: format!("unrecognized notification: {method}") };
    };
    let params = params.unwrap_or(serde_json::Value::Null);
    match known {
        KnownNotification::ThreadStarted => {
            let id = str_field(&params, "thread_id");
            *thread_id.lock() = Some(id.clone());
            ProviderEvent::Ready { thread_id: id }
        }
        KnownNotification::AgentMessageDelta => ProviderEvent::AssistantDelta {
            turn_id: str_field(&params, "turn_id"),
            item_id: str_field(&params, "item_id"),
            delta: str_field(&params, "delta"),
        },
        KnownNotification::CommandExecutionOutputDelta => ProviderEvent::CommandExecutionDelta {
            turn_id: str_field(&params, "turn_id"),
            item_id: str_field(&params, "item_id"),
            delta: str_field(&params, "delta"),
        },
        KnownNotification::ItemCompletedAgentMessage => {
            let item = params.get("item").cloned().unwrap_or_default();
            ProviderEvent::AssistantMessage {
                turn_id: str_field(&params, "turn_id"),
                item_id: str_field(&item, "id"),
                text: item.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            }
        }
        KnownNotification::ItemCompletedCommandExecution => {
            let item = params.get("item").cloned().unwrap_or_default();
            ProviderEvent::CommandExecutionCompleted {
                turn_id: str_field(&params, "turn_id"),
                item_id: str_field(&item, "id"),
                item,
            }
        }
        KnownNotification::TurnStarted => {
            let turn_id = str_field(&params, "turn_id");
            turns.start(turn_id.clone());
            ProviderEvent::TurnStarted { turn_id }
        }
        KnownNotification::TurnCompleted => {
            let turn_id = str_field(&params, "turn_id");
            turns.finish(&turn_id);
            ProviderEvent::TurnCompleted { turn_id }
        }
        KnownNotification::Error => {
            let turn_id = str_field(&params, "turn_id");
            let will_retry = params.get("will_retry").and_then(|v| v.as_bool()).unwrap_or(false);
            if !will_retry {
                turns.finish(&turn_id);
            }
            ProviderEvent::TurnError {
                turn_id,
                message: params.get("message").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                will_retry,
            }
        }
        KnownNotification::AccountLoginCompleted => ProviderEvent::AccountLoginCompleted,
    }
}

#[async_trait]
impl<C: Clock + Send + Sync + 'static> ProviderClient for CodexClient<C> {
    fn provider(&self) -> Provider {
        Provider::Codex
    }

    async fn start(&self) -> Result<(), SupervisorError> {
        if self.running.lock().await.is_some() {
            return Err(SupervisorError::AlreadyStarted);
        }
        let _ = self.sink.send(ProviderEvent::ThreadStarting);
        self.set_status(ClientStatus::Starting);

        let handle = self.executor.stream(&self.workspace_id, &self.argv, &self.exec_opts).await?;
        let (pid, stdin, stdout, stderr, exit_rx) = handle.split();

        let bootstrap = self.bootstrap_params();
        let mut thread_params = bootstrap.clone();
        let method = if let Some(thread_id) = self.resume_thread_id.clone() {
            thread_params["threadId"] = serde_json::Value::String(thread_id);
            thread_params["resume"] = serde_json::Value::Bool(true);
            "thread/resume"
        } else {
            "thread/start"
        };

        let reader_task = {
            let promises = self.promises.clone();
            let sink = self.sink.clone();
            let logger = self.logger.clone();
            let turns = self.turns.clone();
            let thread_id = self.thread_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if let Some(logger) = &logger {
                                logger.log(LogDirection::Out, &line).await;
                            }
                            let _ = sink.send(ProviderEvent::RpcOut {
                                payload: serde_json::from_str(&line).unwrap_or(serde_json::Value::Null),
                            });
                            let parsed: Result<JsonRpcLine, _> = serde_json::from_str(&line);
                            match parsed {
                                Ok(parsed) if parsed.is_response() => {
                                    if let Some(id) = parsed.id {
                                        let result = match parsed.error {
                                            Some(err) => Err(err),
                                            None => Ok(parsed.result.unwrap_or(serde_json::Value::Null)),
                                        };
                                        promises.resolve(id, result);
                                    }
                                }
                                Ok(parsed) if parsed.is_notification() => {
                                    let method = parsed.method.unwrap_or_default();
                                    let event = translate_notification(&method, parsed.params, &turns, &thread_id);
                                    let _ = sink.send(event);
                                }
                                _ => tracing::debug!(%line, "unparseable codex line"),
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::warn!(error = %err, "codex stdout read error");
                            break;
                        }
                    }
                }
                promises.fail_all("child stdout closed");
            })
        };

        let stderr_sink = self.sink.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = stderr_sink.send(ProviderEvent::Log { message: line });
            }
        });

        let watcher_sink = self.sink.clone();
        let expected_exit_reason = self.expected_exit_reason.clone();
        let watcher_task = tokio::spawn(async move {
            let info = exit_rx.await.unwrap_or(ExitInfo { code: None, signal: None });
            let reason = expected_exit_reason.lock().take().unwrap_or(ExitReason::Crashed);
            let _ = watcher_sink.send(ProviderEvent::Exit {
                code: info.code,
                signal: info.signal.map(|s| s.to_string()),
                reason,
            });
        });

        {
            let mut guard = self.running.lock().await;
            *guard = Some(Running { pid, stdin, reader_task, watcher_task });
        }

        if let Err(err) = self.send_request("initialize", Some(bootstrap)).await {
            self.set_status(ClientStatus::Stopping);
            return Err(err);
        }

        match self.send_request(method, Some(thread_params)).await {
            Ok(_) => {
                self.set_status(ClientStatus::Idle);
                Ok(())
            }
            Err(err) => {
                self.set_status(ClientStatus::Stopping);
                Err(err)
            }
        }
    }

    async fn stop(&self, opts: StopOpts) -> Result<(), SupervisorError> {
        let mut guard = self.running.lock().await;
        let Some(Running { pid, reader_task, watcher_task, .. }) = guard.take() else {
            return Ok(());
        };
        *self.expected_exit_reason.lock() = Some(opts.reason);
        self.set_status(ClientStatus::Stopping);
        let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(nix_pid, stop_signal(opts.force));
        if !opts.force && opts.timeout > Duration::ZERO {
            let grace = opts.timeout.min(Duration::from_secs(30));
            if tokio::time::timeout(grace, watcher_task).await.is_err() {
                let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGKILL);
            }
        }
        reader_task.abort();
        self.promises.fail_all("client stopped");
        Ok(())
    }

    async fn send_turn(&self, text: String, attachments: Vec<String>) -> Result<TurnHandle, SupervisorError> {
        let params = serde_json::json!({ "text": text, "attachments": attachments });
        let result = self.send_request("turn/send", Some(params)).await?;
        let turn_id = str_field(&result, "turn_id");
        Ok(TurnHandle { turn_id })
    }

    async fn interrupt_turn(&self, turn_id: &str) -> Result<(), SupervisorError> {
        self.send_request("turn/interrupt", Some(serde_json::json!({ "turn_id": turn_id }))).await?;
        Ok(())
    }

    async fn list_models(&self, cursor: Option<String>, limit: Option<u32>) -> Result<ModelPage, SupervisorError> {
        let params = serde_json::json!({ "cursor": cursor, "limit": limit });
        let result = self.send_request("model/list", Some(params)).await?;
        let models = result
            .get("models")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let cursor = result.get("cursor").and_then(|v| v.as_str()).map(str::to_string);
        Ok(ModelPage { models, cursor })
    }

    async fn set_default_model(&self, model: String, reasoning_effort: Option<String>) -> Result<(), SupervisorError> {
        self.send_request(
            "model/setDefault",
            Some(serde_json::json!({ "model": model, "reasoningEffort": reasoning_effort })),
        )
        .await?;
        Ok(())
    }

    async fn start_account_login(&self, params: AccountLoginParams) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::AccountLoginStarted);
        self.send_request("account/login/start", Some(params.extra)).await?;
        Ok(())
    }

    fn request_restart(&self) {
        self.turns.request_restart();
    }

    fn status(&self) -> ClientStatus {
        *self.status.lock()
    }
}

/// The signal `stop({force})` sends before escalating (spec.md §4.6
/// "Lifecycle"): SIGTERM first, SIGKILL once forced.
pub fn stop_signal(force: bool) -> Signal {
    if force {
        Signal::SIGKILL
    } else {
        Signal::SIGTERM
    }
}

pub use protocol::PromiseMap as CodexPromiseMap;
