//! spec.md §8 scenario 3: "Parallel worktrees" — two worktrees on separate
//! providers, each driven concurrently, reach `turn_completed`
//! independently without touching each other's (or `main`'s) message log.

use std::sync::Arc;

use vibe80_core::{Provider, WorktreeId};
use vibe80_storage::StorageAdapter;
use vibe80_wire::InboundEnvelope;

use crate::support::{build_context, sample_session, sample_worktree, settle, FakeClientFactory};

#[tokio::test]
#[serial_test::serial(env)]
async fn two_worktrees_complete_turns_independently() {
    let factory = Arc::new(FakeClientFactory::new(true));
    let context = build_context(factory.clone());

    let session_id = vibe80_core::SessionId::generate();
    let session = sample_session(&session_id, vec![Provider::Codex, Provider::Claude]);
    context.storage.save_session(session).await.unwrap();

    let wa = WorktreeId::generate();
    let wb = WorktreeId::generate();
    context.storage.save_worktree(session_id.as_str(), sample_worktree(wa.clone(), Provider::Codex)).await.unwrap();
    context.storage.save_worktree(session_id.as_str(), sample_worktree(wb.clone(), Provider::Claude)).await.unwrap();
    context
        .storage
        .save_worktree(session_id.as_str(), sample_worktree(WorktreeId::main(), Provider::Codex))
        .await
        .unwrap();

    let handle = context.sessions.ensure_loaded(&session_id).await.unwrap();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let conn = context.conns.register(tx);

    let send_a = vibe80d::dispatch::handle(
        &context,
        &handle,
        &session_id,
        conn,
        InboundEnvelope::UserMessage { worktree_id: Some(wa.to_string()), text: "work on A".into(), attachments: vec![] },
    );
    let send_b = vibe80d::dispatch::handle(
        &context,
        &handle,
        &session_id,
        conn,
        InboundEnvelope::UserMessage { worktree_id: Some(wb.to_string()), text: "work on B".into(), attachments: vec![] },
    );
    tokio::join!(send_a, send_b);
    settle().await;

    let codex_client = factory.get(wa.as_str());
    let claude_client = factory.get(wb.as_str());
    assert_eq!(codex_client.status(), vibe80_supervisor::ClientStatus::Idle);
    assert_eq!(claude_client.status(), vibe80_supervisor::ClientStatus::Idle);

    let messages_a = context.storage.load_worktree_messages(wa.as_str()).await.unwrap();
    let messages_b = context.storage.load_worktree_messages(wb.as_str()).await.unwrap();
    assert_eq!(messages_a.len(), 2);
    assert_eq!(messages_b.len(), 2);

    let main_messages = context.storage.load_worktree_messages(WorktreeId::main().as_str()).await.unwrap();
    assert!(main_messages.is_empty(), "main worktree log must stay untouched by sibling worktree traffic");
}
