// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the Provider Client Supervisor (C6) into the Session & Worktree
//! State registry (C7): constructs a [`ProviderClient`] for a worktree on
//! first use, starts it, and spawns the task that drains its event sink
//! into persistence (C2) and the Streaming Fan-out broadcast (C8).

use std::sync::Arc;

use vibe80_core::{ChatMessage, Clock, Provider, Session, SessionId, Worktree, WorktreeId, WorktreeStatus};
use vibe80_exec::{ExecOpts, NetMode, SandboxPolicy};
use vibe80_supervisor::{ClaudeClient, CodexClient, ProviderClient, ProviderLogger};
use vibe80_wire::{ExitReason, OutboundEnvelope, ProviderEvent};

use crate::context::Context;
use crate::error::DaemonError;
use crate::registry::SessionHandle;

fn provider_binary(provider: Provider) -> &'static str {
    match provider {
        Provider::Codex => "codex",
        Provider::Claude => "claude",
    }
}

fn sandbox_policy(session: &Session, worktree: &Worktree) -> SandboxPolicy {
    let internet_access = worktree.effective_internet_access(session.default_internet_access);
    SandboxPolicy {
        repo_dir: session.layout.repo_dir.clone(),
        tmp_dir: session.layout.tmp_dir.clone(),
        attachments_dir: session.layout.attachments_dir.clone(),
        internet_access,
        net_mode: if internet_access { NetMode::Full } else { NetMode::None },
        extra_allow_rw: vec![worktree.path.clone()],
        extra_allow_rw_files: vec![],
    }
}

fn exec_opts(session: &Session, worktree: &Worktree) -> ExecOpts {
    ExecOpts { cwd: Some(worktree.path.clone()), env: Vec::new(), sandbox: Some(sandbox_policy(session, worktree)) }
}

/// What a [`ClientFactory`] needs to build one provider client; bundled so
/// the trait stays stable as the concrete variants' constructors grow.
pub struct ClientSpec<'a, C: Clock> {
    pub context: &'a Context<C>,
    pub session: &'a Session,
    pub worktree: &'a Worktree,
    pub session_id: &'a SessionId,
    pub sink: tokio::sync::mpsc::UnboundedSender<ProviderEvent>,
}

/// Seam between the Session & Worktree State registry and the concrete
/// `CodexClient`/`ClaudeClient` constructors (spec.md §9 "polymorphism over
/// providers"). Exists so integration tests can substitute scripted clients
/// without spawning a real child process, the way `vibe80-specs` is
/// expected to per SPEC_FULL.md §10.5 ("scripted provider children").
pub trait ClientFactory<C: Clock>: Send + Sync {
    fn build(&self, spec: ClientSpec<'_, C>) -> Arc<dyn ProviderClient>;
}

/// Builds real `CodexClient`/`ClaudeClient` instances over the daemon's
/// helper executor. The production default.
pub struct DefaultClientFactory;

impl<C: Clock + Send + Sync + 'static> ClientFactory<C> for DefaultClientFactory {
    fn build(&self, spec: ClientSpec<'_, C>) -> Arc<dyn ProviderClient> {
        let provider = spec.worktree.provider;
        let logger = if spec.context.config.activate_provider_log {
            Some(Arc::new(ProviderLogger::new(
                &spec.context.provider_log_dir(),
                &provider.to_string(),
                spec.session_id.as_str(),
                spec.worktree.id.as_str(),
            )))
        } else {
            None
        };
        let opts = exec_opts(spec.session, spec.worktree);
        let workspace_id = spec.session.workspace_id.as_str().to_string();
        match provider {
            Provider::Codex => Arc::new(CodexClient::new(
                spec.context.helper_executor.clone(),
                workspace_id,
                provider_binary(provider).to_string(),
                opts,
                spec.sink,
                logger,
                spec.worktree.thread_id.clone(),
                spec.context.config.system_prompt.clone(),
            )),
            Provider::Claude => Arc::new(ClaudeClient::new(
                spec.context.helper_executor.clone(),
                workspace_id,
                provider_binary(provider).to_string(),
                vec![spec.session.layout.repo_dir.clone(), spec.session.layout.attachments_dir.clone()],
                spec.context.config.system_prompt.clone().unwrap_or_default(),
                opts,
                spec.sink,
                logger,
                true,
            )),
        }
    }
}

/// Returns the existing client for `worktree`, or constructs, starts, and
/// registers a fresh one bound to `worktree.provider` (spec.md §4.6).
pub async fn ensure_for<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    session_id: SessionId,
    worktree_id: WorktreeId,
) -> Result<Arc<dyn ProviderClient>, DaemonError> {
    {
        let state = handle.lane.lock().await;
        if let Some(client) = state.runtime.worktree_clients.get(&worktree_id) {
            return Ok(client.clone());
        }
    }

    let (session, worktree, provider) = {
        let state = handle.lane.lock().await;
        let worktree = state.worktree(&worktree_id)?.clone();
        (state.session.clone(), worktree, state.worktree(&worktree_id)?.provider)
    };
    if !session.provider_enabled(provider) {
        return Err(DaemonError::ProviderNotEnabled(provider));
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let client = context.client_factory.build(ClientSpec {
        context,
        session: &session,
        worktree: &worktree,
        session_id: &session_id,
        sink: tx,
    });

    client.start().await?;

    {
        let mut state = handle.lane.lock().await;
        // Another caller may have raced us between the initial cache check
        // and here; the first client to reach this lock wins and the loser's
        // freshly-started child is stopped rather than left to leak.
        if let Some(existing) = state.runtime.worktree_clients.get(&worktree_id) {
            let existing = existing.clone();
            drop(state);
            let _ = client.stop(vibe80_supervisor::StopOpts::forced()).await;
            return Ok(existing);
        }
        state.runtime.worktree_clients.insert(worktree_id.clone(), client.clone());
        state.runtime.clients.insert(provider, client.clone());
    }

    spawn_event_pump(context.clone(), handle.clone(), session_id, worktree_id, provider, rx);
    Ok(client)
}

/// Drains one provider client's event sink for the lifetime of the child,
/// persisting durable side effects (messages, RPC log, worktree status)
/// and broadcasting every event to the session's open sockets (C8).
fn spawn_event_pump<C: Clock + Send + Sync + 'static>(
    context: Arc<Context<C>>,
    handle: Arc<SessionHandle>,
    session_id: SessionId,
    worktree_id: WorktreeId,
    provider: Provider,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ProviderEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(err) =
                handle_event(&context, &handle, &session_id, &worktree_id, provider, &event).await
            {
                tracing::warn!(
                    session_id = %session_id, worktree_id = %worktree_id, error = %err,
                    "failed to persist provider event"
                );
            }
            broadcast(&context, &handle, &worktree_id, event).await;
        }
    });
}

async fn handle_event<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    session_id: &SessionId,
    worktree_id: &WorktreeId,
    provider: Provider,
    event: &ProviderEvent,
) -> Result<(), DaemonError> {
    let now_ms = context.clock.epoch_ms();
    match event {
        ProviderEvent::RpcIn { payload } | ProviderEvent::RpcOut { payload } => {
            let direction = if matches!(event, ProviderEvent::RpcIn { .. }) {
                vibe80_core::RpcDirection::Stdin
            } else {
                vibe80_core::RpcDirection::Stdout
            };
            context
                .storage
                .append_rpc_log(
                    session_id.as_str(),
                    vibe80_core::RpcLogEntry {
                        direction,
                        timestamp_ms: now_ms,
                        payload: payload.to_string(),
                        provider,
                        worktree_id: worktree_id.clone(),
                    },
                )
                .await?;
        }
        ProviderEvent::Ready { thread_id } => {
            transition_worktree(context, handle, session_id, worktree_id, WorktreeStatus::Ready, |wt| {
                wt.thread_id = Some(thread_id.clone());
            })
            .await?;
        }
        ProviderEvent::TurnStarted { .. } => {
            transition_worktree(context, handle, session_id, worktree_id, WorktreeStatus::Processing, |_| {}).await?;
        }
        ProviderEvent::TurnCompleted { .. } => {
            transition_worktree(context, handle, session_id, worktree_id, WorktreeStatus::Ready, |_| {}).await?;
        }
        ProviderEvent::TurnError { will_retry, .. } if !*will_retry => {
            transition_worktree(context, handle, session_id, worktree_id, WorktreeStatus::Error, |_| {}).await?;
        }
        ProviderEvent::AssistantMessage { text, .. } => {
            let message = ChatMessage::assistant(uuid::Uuid::new_v4().to_string(), text.clone(), provider, now_ms);
            context.storage.append_worktree_message(worktree_id.as_str(), message).await?;
        }
        ProviderEvent::Exit { reason, .. } => {
            let next = match reason {
                ExitReason::GcIdle => WorktreeStatus::Stopped,
                ExitReason::Requested => WorktreeStatus::Stopped,
                ExitReason::Crashed => WorktreeStatus::Error,
            };
            transition_worktree(context, handle, session_id, worktree_id, next, |_| {}).await?;
            let mut state = handle.lane.lock().await;
            state.runtime.worktree_clients.remove(worktree_id);
        }
        _ => {}
    }
    Ok(())
}

async fn transition_worktree<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    session_id: &SessionId,
    worktree_id: &WorktreeId,
    next: WorktreeStatus,
    mutate: impl FnOnce(&mut Worktree),
) -> Result<(), DaemonError> {
    let worktree = {
        let mut state = handle.lane.lock().await;
        let worktree = state.worktree_mut(worktree_id)?;
        mutate(worktree);
        if worktree.status != next {
            if let Err(err) = worktree.transition(next) {
                tracing::warn!(
                    worktree_id = %worktree_id, from = ?worktree.status, to = ?next, error = %err,
                    "ignoring invalid worktree status transition"
                );
            }
        }
        worktree.last_activity_at_ms = context.clock.epoch_ms();
        worktree.clone()
    };
    context.storage.save_worktree(session_id.as_str(), worktree).await?;
    Ok(())
}

/// Broadcasts one provider event, wrapped per worktree, to every open
/// socket in the session (spec.md §4.8 "Outbound broadcast"). A send that
/// fails (socket gone) evicts that connection from the session's socket
/// set under the lane, per the same section's "failed write closes the
/// socket" rule.
async fn broadcast<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    worktree_id: &WorktreeId,
    event: ProviderEvent,
) {
    let envelope = OutboundEnvelope::for_worktree(worktree_id.to_string(), event);
    let sockets: Vec<_> = { handle.lane.lock().await.runtime.sockets.iter().copied().collect() };
    let mut dead = Vec::new();
    for conn in sockets {
        if !context.conns.send(conn, &envelope) {
            dead.push(conn);
        }
    }
    if !dead.is_empty() {
        let mut state = handle.lane.lock().await;
        for conn in dead {
            state.runtime.remove_socket(conn);
            context.conns.remove(conn);
        }
    }
}
