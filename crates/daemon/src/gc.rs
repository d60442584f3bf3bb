// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GC & Timers (C9): three independent periodic sweepers spawned at boot.
//! Intervals not exposed as `Config` fields are fixed per spec.md §4.9's
//! literal defaults rather than invented env vars.

use std::sync::Arc;
use std::time::Duration;

use vibe80_core::Clock;
use vibe80_supervisor::{ClientStatus, StopOpts};

use crate::context::Context;

/// Handoff tokens are single-use and short-lived; sweeping expired ones
/// every 30s (spec.md §4.9) bounds how long a stale one can linger in
/// storage without costing a full session-GC pass to reclaim it.
const HANDOFF_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// How long an idle child (no active turn, no traffic) is kept alive
/// before its worktree's child process is torn down to free resources
/// (spec.md §4.9 "per-provider threshold"). Not user-configurable: the
/// number is about process churn, not session lifetime policy.
const IDLE_CHILD_THRESHOLD: Duration = Duration::from_secs(15 * 60);
const IDLE_CHILD_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn spawn_all<C: Clock + Send + Sync + 'static>(
    context: Arc<Context<C>>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    spawn_session_gc(context.clone(), shutdown.clone());
    spawn_handoff_sweep(context.clone(), shutdown.clone());
    spawn_idle_child_gc(context, shutdown);
}

/// Evicts sessions past `session_idle_ttl`/`session_max_ttl` (spec.md §4.9
/// "evicting entails"): stop every child, close every socket, remove the
/// session directory, delete the storage record.
fn spawn_session_gc<C: Clock + Send + Sync + 'static>(
    context: Arc<Context<C>>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let interval = context.config.session_gc_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => sweep_sessions(&context).await,
            }
        }
    });
}

async fn sweep_sessions<C: Clock + Send + Sync + 'static>(context: &Arc<Context<C>>) {
    let now_ms = context.clock.epoch_ms();
    for session_id in context.sessions.loaded_ids() {
        let Some(handle) = context.sessions.get_loaded(&session_id) else { continue };
        let (idle_for, age, clients) = {
            let state = handle.lane.lock().await;
            let idle_for = now_ms.saturating_sub(state.session.last_activity_at_ms);
            let age = now_ms.saturating_sub(state.session.created_at_ms);
            let clients: Vec<_> = state.runtime.worktree_clients.values().cloned().collect();
            (idle_for, age, clients)
        };
        let idle_expired = idle_for > context.config.session_idle_ttl.as_millis() as u64;
        let max_expired = age > context.config.session_max_ttl.as_millis() as u64;
        if !idle_expired && !max_expired {
            continue;
        }
        tracing::info!(session_id = %session_id, idle_expired, max_expired, "evicting session");
        for client in clients {
            if let Err(err) = client.stop(StopOpts::forced()).await {
                tracing::warn!(session_id = %session_id, error = %err, "failed to stop child during gc");
            }
        }
        let sockets: Vec<_> = { handle.lane.lock().await.runtime.sockets.iter().copied().collect() };
        for conn in sockets {
            context.conns.remove(conn);
        }
        let session_dir = { handle.lane.lock().await.session.layout.session_dir.clone() };
        if let Err(err) = tokio::fs::remove_dir_all(&session_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session_id = %session_id, error = %err, "failed to remove session directory");
            }
        }
        if let Err(err) = context.storage.delete_session(session_id.as_str()).await {
            tracing::warn!(session_id = %session_id, error = %err, "failed to delete session record");
        }
        context.sessions.evict(&session_id);
    }
}

/// `AuthManager::sweep()` drops expired handoff/mono tokens and the
/// rotation-coalescing cache (spec.md §4.3, §4.9).
fn spawn_handoff_sweep<C: Clock + Send + Sync + 'static>(
    context: Arc<Context<C>>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HANDOFF_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => context.auth.sweep(),
            }
        }
    });
}

/// Stops children that have gone idle past the per-provider threshold,
/// freeing resources without evicting the session itself (spec.md §4.9
/// "Idle child GC per supervisor").
fn spawn_idle_child_gc<C: Clock + Send + Sync + 'static>(
    context: Arc<Context<C>>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(IDLE_CHILD_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => sweep_idle_children(&context).await,
            }
        }
    });
}

async fn sweep_idle_children<C: Clock + Send + Sync + 'static>(context: &Arc<Context<C>>) {
    let now_ms = context.clock.epoch_ms();
    for session_id in context.sessions.loaded_ids() {
        let Some(handle) = context.sessions.get_loaded(&session_id) else { continue };
        let idle_worktrees = {
            let state = handle.lane.lock().await;
            state
                .runtime
                .worktree_clients
                .iter()
                .filter_map(|(worktree_id, client)| {
                    let worktree = state.worktrees.get(worktree_id)?;
                    let idle_for = now_ms.saturating_sub(worktree.last_activity_at_ms);
                    let idle = client.status() == ClientStatus::Idle
                        && idle_for > IDLE_CHILD_THRESHOLD.as_millis() as u64;
                    idle.then(|| (worktree_id.clone(), client.clone()))
                })
                .collect::<Vec<_>>()
        };
        for (worktree_id, client) in idle_worktrees {
            tracing::debug!(session_id = %session_id, %worktree_id, "stopping idle child");
            if let Err(err) = client.stop(StopOpts::idle(Duration::from_secs(5))).await {
                tracing::warn!(session_id = %session_id, %worktree_id, error = %err, "idle gc stop failed");
                continue;
            }
            let mut state = handle.lane.lock().await;
            state.runtime.worktree_clients.remove(&worktree_id);
            state.runtime.clients.retain(|_, c| !Arc::ptr_eq(c, &client));
        }
    }
}
