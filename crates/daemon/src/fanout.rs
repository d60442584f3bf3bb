// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming Fan-out (C8): the `/chat?token=<access>&session=<sessionId>`
//! WebSocket duplex channel. Grounded on the donor's `Listener` accept loop
//! (`daemon_old::listener::Listener::run_unix_only`) — a TCP accept loop
//! spawning one task per connection, rather than the donor's Unix/TCP dual
//! mode (this daemon has no local control socket to multiplex).

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use vibe80_core::{Clock, SessionId};
use vibe80_wire::OutboundEnvelope;

use crate::context::Context;
use crate::dispatch;
use crate::registry::{SessionHandle, SessionState};

/// Runs the accept loop until `shutdown` fires. Each accepted connection is
/// handled on its own task so a slow or stuck client never blocks others.
pub async fn run<C: Clock + Send + Sync + 'static>(
    listener: TcpListener,
    context: Arc<Context<C>>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("fan-out accept loop shutting down");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let context = context.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, addr, context).await {
                                debug!(%addr, error = %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "tcp accept error"),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("missing query string")]
    MissingQuery,

    #[error("missing session parameter")]
    MissingSession,
}

/// Pulled out of the handshake request before the WebSocket upgrade
/// consumes it, since `tokio-tungstenite` only exposes the request to a
/// callback invoked during the accept.
struct ConnParams {
    token: Option<String>,
    refresh_token: Option<String>,
    session_id: String,
}

fn parse_query(query: &str) -> (Option<String>, Option<String>, Option<String>) {
    let mut token = None;
    let mut refresh = None;
    let mut session = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "refresh" => refresh = Some(value.into_owned()),
            "session" => session = Some(value.into_owned()),
            _ => {}
        }
    }
    (token, refresh, session)
}

async fn handle_connection<C: Clock + Send + Sync + 'static>(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    context: Arc<Context<C>>,
) -> Result<(), ConnectionError> {
    let mut params: Option<ConnParams> = None;
    let callback = |req: &tokio_tungstenite::tungstenite::handshake::server::Request,
                    resp: tokio_tungstenite::tungstenite::handshake::server::Response| {
        let query = req.uri().query().unwrap_or_default();
        let (token, refresh_token, session) = parse_query(query);
        params = Some(ConnParams { token, refresh_token, session_id: session.unwrap_or_default() });
        Ok(resp)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let params = params.ok_or(ConnectionError::MissingQuery)?;
    if params.session_id.is_empty() {
        return Err(ConnectionError::MissingSession);
    }
    let session_id = SessionId::parse(&params.session_id).map_err(|_| ConnectionError::MissingSession)?;

    let workspace_id = context.auth.resolve_workspace_token(params.token.as_deref());
    let (mut write, mut read) = ws.split();

    let workspace_id = match workspace_id {
        Ok(id) => id,
        Err(_) => {
            let _ = send_error(&mut write, "Invalid workspace token.", None).await;
            return Ok(());
        }
    };

    let handle = match context.sessions.ensure_loaded(&session_id).await {
        Ok(handle) => handle,
        Err(_) => {
            let _ = send_error(&mut write, "Unknown session.", Some(vibe80_wire::ErrorCode::SessionNotFound)).await;
            return Ok(());
        }
    };
    {
        let state = handle.lane.lock().await;
        if state.session.workspace_id != workspace_id {
            drop(state);
            let _ = send_error(&mut write, "Unknown session.", Some(vibe80_wire::ErrorCode::SessionNotFound)).await;
            return Ok(());
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn_id = context.conns.register(tx);
    {
        let mut state = handle.lane.lock().await;
        register(&mut state, conn_id);
    }
    info!(%addr, session_id = %session_id, "streaming connection established");

    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if write.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut access_token = params.token.unwrap_or_default();
    let mut refresh_token = params.refresh_token;

    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(_) => break,
        };
        let text = match frame {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => continue,
        };

        // spec.md §4.8: once the access token has gone stale, recover with
        // a single in-flight refresh via C3 before closing the socket, so a
        // long-lived connection survives access-token expiry.
        if context.auth.verify_access_token(&access_token).is_err() {
            match refresh_auth(&context, &workspace_id, refresh_token.as_deref()).await {
                Some(pair) => {
                    access_token = pair.access_token;
                    refresh_token = Some(pair.refresh_token);
                    resync_worktrees(&context, &handle, conn_id).await;
                }
                None => {
                    context.conns.send(
                        conn_id,
                        &OutboundEnvelope::Error {
                            message: "Workspace auth expired.".to_string(),
                            error_code: Some(vibe80_wire::ErrorCode::WorkspaceTokenInvalid),
                        },
                    );
                    break;
                }
            }
        }

        let envelope: vibe80_wire::InboundEnvelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                context.conns.send(
                    conn_id,
                    &OutboundEnvelope::Error { message: format!("malformed frame: {err}"), error_code: None },
                );
                continue;
            }
        };
        dispatch::handle(&context, &handle, &session_id, conn_id, envelope).await;
    }

    {
        let mut state = handle.lane.lock().await;
        state.runtime.remove_socket(conn_id);
    }
    context.conns.remove(conn_id);
    writer_task.abort();
    info!(%addr, session_id = %session_id, "streaming connection closed");
    Ok(())
}

fn register(state: &mut SessionState, conn: vibe80_core::ConnId) {
    state.runtime.register_socket(conn);
}

/// Attempts the single recovery path spec.md §4.8 allows for a stale
/// connection: rotate the presented refresh token through C3. Concurrent
/// callers on other connections presenting the same refresh token coalesce
/// onto the same winning rotation via `AuthManager::rotate_refresh_token`'s
/// own single-flight cache, so no extra coordination is needed here.
async fn refresh_auth<C: vibe80_core::Clock + Send + Sync + 'static>(
    context: &Context<C>,
    workspace_id: &vibe80_core::WorkspaceId,
    refresh_token: Option<&str>,
) -> Option<vibe80_auth::TokenPair> {
    let refresh_token = refresh_token?;
    context.auth.rotate_refresh_token(workspace_id.as_str(), refresh_token).await.ok()
}

/// Re-syncs every worktree's message history to one connection after an
/// auth recovery, in case it missed broadcasts while its access token was
/// stale.
async fn resync_worktrees<C: Clock + Send + Sync + 'static>(
    context: &Context<C>,
    handle: &SessionHandle,
    conn: vibe80_core::ConnId,
) {
    let worktree_ids: Vec<_> = {
        let state = handle.lane.lock().await;
        state.worktrees.keys().cloned().collect()
    };
    for worktree_id in worktree_ids {
        let status = {
            let state = handle.lane.lock().await;
            match state.worktree(&worktree_id) {
                Ok(worktree) => worktree.status,
                Err(_) => continue,
            }
        };
        let messages = context.sessions.messages_since(&worktree_id, None).await.unwrap_or_default();
        context.conns.send(
            conn,
            &OutboundEnvelope::WorktreeMessagesSync { worktree_id: worktree_id.to_string(), messages, status },
        );
    }
}

async fn send_error(
    write: &mut (impl futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    message: &str,
    error_code: Option<vibe80_wire::ErrorCode>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let envelope = OutboundEnvelope::Error { message: message.to_string(), error_code };
    let text = serde_json::to_string(&envelope).unwrap_or_default();
    write.send(Message::Text(text.into())).await
}
