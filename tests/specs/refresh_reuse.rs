//! spec.md §8 scenario 2: "Refresh reuse detection" — `login` mints
//! `(A1,R1)`; `refresh(R1)` mints `(A2,R2)`; after the rotation grace
//! window elapses, `refresh(R1)` again is rejected as reuse and clears all
//! refresh state, so a subsequent `refresh(R2)` is rejected too.

use std::sync::Arc;

use vibe80_auth::{AuthError, AuthManager};
use vibe80_core::{FakeClock, WorkspaceId};
use vibe80_storage::{MemoryStorageAdapter, StorageAdapter};

use crate::support::test_config;

#[tokio::test]
#[serial_test::serial(env)]
async fn reused_refresh_token_is_rejected_and_clears_all_state() {
    let config = test_config();
    let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorageAdapter::new());
    let clock = FakeClock::new();
    let manager = AuthManager::new(&config, storage.clone(), clock.clone());
    let workspace_id = WorkspaceId::generate();

    let pair_a1_r1 = manager.issue_initial_pair(&workspace_id).await.unwrap();
    let pair_a2_r2 = manager.rotate_refresh_token(workspace_id.as_str(), &pair_a1_r1.refresh_token).await.unwrap();
    assert_ne!(pair_a1_r1.refresh_token, pair_a2_r2.refresh_token);

    // Past the rotation grace window, R1 is neither current nor
    // still-valid-previous: a second presentation now reads as reuse.
    clock.advance(config.refresh_token_rotation_grace + std::time::Duration::from_secs(1));

    let reuse = manager.rotate_refresh_token(workspace_id.as_str(), &pair_a1_r1.refresh_token).await.unwrap_err();
    assert!(matches!(reuse, AuthError::RefreshReused));

    let state = storage.get_workspace_refresh_state(workspace_id.as_str()).await.unwrap();
    assert!(state.is_none(), "reuse must clear the workspace's entire refresh chain");

    let second = manager.rotate_refresh_token(workspace_id.as_str(), &pair_a2_r2.refresh_token).await.unwrap_err();
    assert!(matches!(second, AuthError::RefreshInvalid));
}
