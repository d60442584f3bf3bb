//! spec.md §8 scenario 6: "Auth recovery" — once an access token goes
//! stale, any number of concurrent callers presenting the same refresh
//! token must coalesce onto exactly one winning rotation rather than each
//! minting (and invalidating) their own pair. `fanout.rs`'s per-frame
//! recovery path (`refresh_auth`) calls into this same coalescing point,
//! so the guarantee is exercised directly at its actual seam:
//! `AuthManager::rotate_refresh_token`'s `rotation_cache`.

use std::sync::Arc;

use vibe80_auth::AuthManager;
use vibe80_core::{FakeClock, WorkspaceId};
use vibe80_storage::{MemoryStorageAdapter, StorageAdapter};

use crate::support::test_config;

#[tokio::test]
#[serial_test::serial(env)]
async fn ten_concurrent_refreshes_of_the_same_token_coalesce_to_one_rotation() {
    let config = test_config();
    let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorageAdapter::new());
    let manager = Arc::new(AuthManager::new(&config, storage, FakeClock::new()));
    let workspace_id = WorkspaceId::generate();
    let initial = manager.issue_initial_pair(&workspace_id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        let workspace_id = workspace_id.clone();
        let refresh_token = initial.refresh_token.clone();
        handles.push(tokio::spawn(async move {
            manager.rotate_refresh_token(workspace_id.as_str(), &refresh_token).await
        }));
    }

    let mut rotated = Vec::new();
    for handle in handles {
        rotated.push(handle.await.unwrap().expect("every concurrent caller must see the winning rotation"));
    }

    let first = &rotated[0].refresh_token;
    assert!(
        rotated.iter().all(|pair| &pair.refresh_token == first),
        "all ten concurrent frames must observe exactly one coalesced rotation"
    );
}
