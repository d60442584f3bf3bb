//! spec.md §8 scenario 5: "Restart if idle" — `request_restart()` while a
//! turn is outstanding must not restart the child until that turn
//! completes, at which point the deferred restart fires as `exit` followed
//! by a fresh `ready`.

use std::sync::Arc;

use vibe80_core::{Provider, WorktreeId};
use vibe80_supervisor::ProviderClient;
use vibe80_wire::{InboundEnvelope, ProviderEvent};

use crate::support::{build_context, sample_session, sample_worktree, settle, FakeClientFactory};

#[tokio::test]
#[serial_test::serial(env)]
async fn restart_is_deferred_until_the_outstanding_turn_completes() {
    let factory = Arc::new(FakeClientFactory::new(false));
    let context = build_context(factory.clone());

    let session_id = vibe80_core::SessionId::generate();
    let session = sample_session(&session_id, vec![Provider::Codex]);
    context.storage.save_session(session).await.unwrap();
    context
        .storage
        .save_worktree(session_id.as_str(), sample_worktree(WorktreeId::main(), Provider::Codex))
        .await
        .unwrap();

    let handle = context.sessions.ensure_loaded(&session_id).await.unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let conn = context.conns.register(tx);
    {
        let mut state = handle.lane.lock().await;
        state.runtime.register_socket(conn);
    }

    vibe80d::dispatch::handle(
        &context,
        &handle,
        &session_id,
        conn,
        InboundEnvelope::UserMessage { worktree_id: None, text: "long running turn".into(), attachments: vec![] },
    )
    .await;
    settle().await;

    let client = factory.get(WorktreeId::main().as_str());
    assert_eq!(client.status(), vibe80_supervisor::ClientStatus::Busy);

    client.request_restart();
    settle().await;
    assert_eq!(
        client.status(),
        vibe80_supervisor::ClientStatus::Busy,
        "a restart request must not preempt an outstanding turn"
    );
    // Drain so far: only turn_started should have reached the socket.
    let mut saw_exit_before_completion = false;
    while let Ok(msg) = rx.try_recv() {
        if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
            if let Ok(vibe80_wire::OutboundEnvelope::Worktree { event: ProviderEvent::Exit { .. }, .. }) =
                serde_json::from_str(&text)
            {
                saw_exit_before_completion = true;
            }
        }
    }
    assert!(!saw_exit_before_completion, "no exit/restart may occur while the turn is still outstanding");

    client.complete_turn("turn-0", "done");
    settle().await;
    assert_eq!(client.status(), vibe80_supervisor::ClientStatus::Idle);

    let mut saw_exit = false;
    let mut saw_fresh_ready = false;
    while let Ok(msg) = rx.try_recv() {
        if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
            match serde_json::from_str::<vibe80_wire::OutboundEnvelope>(&text) {
                Ok(vibe80_wire::OutboundEnvelope::Worktree { event: ProviderEvent::Exit { .. }, .. }) => {
                    saw_exit = true;
                }
                Ok(vibe80_wire::OutboundEnvelope::Worktree { event: ProviderEvent::Ready { .. }, .. }) => {
                    saw_fresh_ready = true;
                }
                _ => {}
            }
        }
    }
    assert!(saw_exit, "deferred restart must emit exit once the turn completes");
    assert!(saw_fresh_ready, "deferred restart must bring the child back to ready");
}
