// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API Surface (C10): the routing table from `InboundEnvelope` to the
//! component that handles it (spec.md §4.8's "inbound routing table").
//! Every branch replies to the sender only, except `switch_provider`,
//! which also affects the session's `active_provider` and so is visible
//! to every other open socket through the normal provider-event broadcast.

use std::sync::Arc;

use vibe80_core::{ChatMessage, Clock, ConnId, SessionId, WorktreeId};
use vibe80_exec::ExecOpts;
use vibe80_git::run_git;
use vibe80_supervisor::AccountLoginParams;
use vibe80_wire::{ActionKind, InboundEnvelope, OutboundEnvelope};

use crate::clients;
use crate::context::Context;
use crate::registry::SessionHandle;

/// Dispatches one inbound frame and writes whatever reply it produces back
/// to `conn` (the sending socket). Errors are mapped to `OutboundEnvelope::Error`
/// rather than dropping the connection, so one bad frame doesn't kill the
/// whole duplex channel.
pub async fn handle<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    session_id: &SessionId,
    conn: ConnId,
    envelope: InboundEnvelope,
) {
    let result = route(context, handle, session_id, conn, envelope).await;
    if let Err(err) = result {
        context.conns.send(
            conn,
            &OutboundEnvelope::Error { message: err.to_string(), error_code: Some(err.error_code()) },
        );
    }
}

async fn route<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    session_id: &SessionId,
    conn: ConnId,
    envelope: InboundEnvelope,
) -> Result<(), crate::error::DaemonError> {
    context.sessions.touch(handle, context.clock.epoch_ms()).await?;

    match envelope {
        InboundEnvelope::Ping => {
            context.conns.send(conn, &OutboundEnvelope::Pong);
        }

        InboundEnvelope::UserMessage { worktree_id, text, attachments } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id.clone()).await?;
            let turn = client.send_turn(text.clone(), attachments.clone()).await?;
            let message = ChatMessage::user(turn.turn_id.clone(), text, client.provider(), context.clock.epoch_ms());
            context.storage.append_worktree_message(worktree_id.as_str(), message).await?;
            context.conns.send(
                conn,
                &OutboundEnvelope::TurnStartedAck { worktree_id: worktree_id.to_string(), turn_id: turn.turn_id },
            );
        }

        InboundEnvelope::WorktreeMessagesSync { worktree_id, last_seen_message_id } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let messages =
                context.sessions.messages_since(&worktree_id, last_seen_message_id.as_deref()).await?;
            let status = {
                let state = handle.lane.lock().await;
                state.worktree(&worktree_id)?.status
            };
            context.conns.send(
                conn,
                &OutboundEnvelope::WorktreeMessagesSync { worktree_id: worktree_id.to_string(), messages, status },
            );
        }

        InboundEnvelope::TurnInterrupt { worktree_id, turn_id } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id).await?;
            client.interrupt_turn(&turn_id).await?;
        }

        InboundEnvelope::SwitchProvider { worktree_id, provider } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            {
                let state = handle.lane.lock().await;
                if let Some(existing) = state.runtime.clients.get(&provider) {
                    if existing.status() == vibe80_supervisor::ClientStatus::Busy {
                        return Err(crate::error::DaemonError::ProviderInUse);
                    }
                }
            }
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id.clone()).await?;
            let messages = context.sessions.messages_since(&worktree_id, None).await?;
            let models = client.list_models(None, None).await?.models;
            {
                let mut state = handle.lane.lock().await;
                state.session.active_provider = provider;
                let session = state.session.clone();
                drop(state);
                context.storage.save_session(session).await?;
            }
            broadcast(context, handle, &OutboundEnvelope::ProviderSwitched {
                worktree_id: worktree_id.to_string(),
                provider,
                messages,
                models,
            })
            .await;
        }

        InboundEnvelope::ModelList { worktree_id, cursor, limit } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id.clone()).await?;
            let page = client.list_models(cursor, limit).await?;
            context.conns.send(
                conn,
                &OutboundEnvelope::ModelList {
                    worktree_id: worktree_id.to_string(),
                    models: page.models,
                    cursor: page.cursor,
                },
            );
        }

        InboundEnvelope::ModelSet { worktree_id, model, reasoning_effort } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id).await?;
            client.set_default_model(model, reasoning_effort).await?;
        }

        InboundEnvelope::AccountLoginStart { worktree_id, provider } => {
            let worktree_id = WorktreeId::resolve(worktree_id.as_deref())
                .map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
            let client = clients::ensure_for(context, handle, session_id.clone(), worktree_id).await?;
            client.start_account_login(AccountLoginParams::default()).await?;
        }

        InboundEnvelope::ActionRequest { worktree_id, kind, command } => {
            run_action(context, handle, worktree_id, kind, command).await?;
        }
    }
    Ok(())
}

async fn run_action<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    worktree_id: Option<String>,
    kind: ActionKind,
    command: String,
) -> Result<(), crate::error::DaemonError> {
    let allowed = match kind {
        ActionKind::Run => context.config.allow_run_slash_command,
        ActionKind::Git => context.config.allow_git_slash_command,
    };
    if !allowed {
        return Err(crate::error::DaemonError::ActionDisabled { kind });
    }
    let worktree_id =
        WorktreeId::resolve(worktree_id.as_deref()).map_err(|_| crate::error::DaemonError::WorktreeNotFound)?;
    let (workspace_id, path) = {
        let state = handle.lane.lock().await;
        (state.session.workspace_id.clone(), state.worktree(&worktree_id)?.path.clone())
    };
    match kind {
        ActionKind::Run => {
            let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            let opts = ExecOpts { cwd: Some(path), ..Default::default() };
            context.helper_executor.run(workspace_id.as_str(), &argv, &opts).await?;
        }
        ActionKind::Git => {
            let args: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            run_git(&context.helper_executor, &path, &args).await?;
        }
    }
    Ok(())
}

async fn broadcast<C: Clock + Send + Sync + 'static>(
    context: &Arc<Context<C>>,
    handle: &Arc<SessionHandle>,
    envelope: &OutboundEnvelope,
) {
    let sockets: Vec<_> = { handle.lane.lock().await.runtime.sockets.iter().copied().collect() };
    for conn in sockets {
        context.conns.send(conn, envelope);
    }
}
