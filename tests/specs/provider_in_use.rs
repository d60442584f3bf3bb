//! spec.md §8 scenario 4: "Disable-in-use protection". The literal scenario
//! disables a provider through `PATCH /workspaces/:id`, an HTTP surface
//! spec.md §1 places outside this crate's scope (external collaborator).
//! The in-scope analogue is `switch_provider`'s busy-rejection: a provider
//! with an outstanding turn cannot be swapped away from underneath it.

use std::sync::Arc;

use vibe80_core::{Provider, WorktreeId};
use vibe80_storage::StorageAdapter;
use vibe80_wire::InboundEnvelope;

use crate::support::{build_context, sample_session, sample_worktree, settle, FakeClientFactory};

#[tokio::test]
#[serial_test::serial(env)]
async fn switch_provider_is_rejected_while_the_target_is_busy() {
    // auto_complete = false: the turn stays outstanding until we manually
    // complete it, letting us observe the busy-rejection window.
    let factory = Arc::new(FakeClientFactory::new(false));
    let context = build_context(factory.clone());

    let session_id = vibe80_core::SessionId::generate();
    let session = sample_session(&session_id, vec![Provider::Codex, Provider::Claude]);
    context.storage.save_session(session).await.unwrap();
    context
        .storage
        .save_worktree(session_id.as_str(), sample_worktree(WorktreeId::main(), Provider::Codex))
        .await
        .unwrap();

    let handle = context.sessions.ensure_loaded(&session_id).await.unwrap();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let conn = context.conns.register(tx);

    vibe80d::dispatch::handle(
        &context,
        &handle,
        &session_id,
        conn,
        InboundEnvelope::UserMessage { worktree_id: None, text: "start a long turn".into(), attachments: vec![] },
    )
    .await;
    settle().await;

    let codex_client = factory.get(WorktreeId::main().as_str());
    assert_eq!(codex_client.status(), vibe80_supervisor::ClientStatus::Busy);

    let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();
    let conn2 = context.conns.register(tx2);
    vibe80d::dispatch::handle(
        &context,
        &handle,
        &session_id,
        conn2,
        InboundEnvelope::SwitchProvider { worktree_id: None, provider: Provider::Codex },
    )
    .await;

    let reply = rx2.try_recv().expect("switch_provider while busy must reply with an error");
    let text = match reply {
        tokio_tungstenite::tungstenite::Message::Text(t) => t,
        other => panic!("unexpected message variant: {other:?}"),
    };
    let envelope: vibe80_wire::OutboundEnvelope = serde_json::from_str(&text).unwrap();
    match envelope {
        vibe80_wire::OutboundEnvelope::Error { error_code, .. } => {
            assert_eq!(error_code, Some(vibe80_wire::ErrorCode::ProviderInUse));
        }
        other => panic!("expected an Error envelope, got {other:?}"),
    }

    let session_after = context.storage.get_session(session_id.as_str()).await.unwrap().unwrap();
    assert_eq!(session_after.active_provider, Provider::Codex, "rejected switch must not change config");
}
