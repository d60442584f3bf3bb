//! spec.md §8 scenario 1: "Codex happy path" — send one `user_message` and
//! observe `turn_started` -> assistant delta(s) -> `assistant_message` ->
//! `turn_completed`, with exactly one user and one assistant entry landing
//! in the `main` worktree's persisted log.

use std::sync::Arc;

use vibe80_core::{Provider, WorktreeId};
use vibe80_storage::StorageAdapter;
use vibe80_wire::{InboundEnvelope, OutboundEnvelope, ProviderEvent};

use crate::support::{build_context, sample_session, sample_worktree, settle, FakeClientFactory};

#[tokio::test]
#[serial_test::serial(env)]
async fn codex_happy_path_completes_a_turn_and_persists_one_exchange() {
    let factory = Arc::new(FakeClientFactory::new(true));
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
        InboundEnvelope::UserMessage { worktree_id: None, text: "hello codex".into(), attachments: vec![] },
    )
    .await;
    settle().await;

    let mut saw_turn_started = false;
    let mut saw_assistant_delta = false;
    let mut saw_assistant_message = false;
    let mut saw_turn_completed = false;
    while let Ok(msg) = rx.try_recv() {
        let text = match msg {
            tokio_tungstenite::tungstenite::Message::Text(t) => t,
            _ => continue,
        };
        let envelope: OutboundEnvelope = serde_json::from_str(&text).unwrap();
        match envelope {
            OutboundEnvelope::TurnStartedAck { .. } => {}
            OutboundEnvelope::Worktree { event, .. } => match event {
                ProviderEvent::TurnStarted { .. } => saw_turn_started = true,
                ProviderEvent::AssistantDelta { .. } => saw_assistant_delta = true,
                ProviderEvent::AssistantMessage { .. } => saw_assistant_message = true,
                ProviderEvent::TurnCompleted { .. } => saw_turn_completed = true,
                _ => {}
            },
            _ => {}
        }
    }
    assert!(saw_turn_started, "expected turn_started before any assistant output");
    assert!(saw_assistant_delta, "expected at least one assistant_delta");
    assert!(saw_assistant_message, "expected a final assistant_message");
    assert!(saw_turn_completed, "expected turn_completed to close the turn");

    let messages = context.storage.load_worktree_messages(WorktreeId::main().as_str()).await.unwrap();
    assert_eq!(messages.len(), 2, "exactly one user then one assistant message");
    assert_eq!(messages[0].role, vibe80_core::Role::User);
    assert_eq!(messages[1].role, vibe80_core::Role::Assistant);
}
