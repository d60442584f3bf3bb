// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Auth Manager (C3): access-token mint/verify, refresh-token rotation
//! with reuse detection, handoff and mono-auth tokens, all behind one
//! `AuthManager`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use vibe80_core::{Clock, Config, DeploymentMode, SessionId, SystemClock, WorkspaceId};
use vibe80_storage::{RotateDecision, StorageAdapter};

use crate::access::{self, AccessClaims};
use crate::error::AuthError;
use crate::handoff::HandoffRegistry;
use crate::refresh;

/// A freshly minted `(access, refresh)` pair, as returned to a client.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at_ms: u64,
}

/// Cached result of a winning rotation, keyed by the hash the winner
/// presented. A concurrent second caller presenting the same (now
/// "previous") hash gets this pair back instead of minting its own
/// (spec.md §4.3: "return new pair already generated during the winning
/// rotation").
struct CachedRotation {
    pair: TokenPair,
    expires_at_ms: u64,
}

pub struct AuthManager<C: Clock = SystemClock> {
    jwt_key: Vec<u8>,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    refresh_rotation_grace: Duration,
    handoff_token_ttl: Duration,
    mono_auth_token_ttl: Duration,
    deployment_mode: DeploymentMode,
    storage: Arc<dyn StorageAdapter>,
    clock: C,
    handoff: HandoffRegistry,
    rotation_cache: Mutex<HashMap<(String, String), CachedRotation>>,
}

impl<C: Clock> AuthManager<C> {
    pub fn new(config: &Config, storage: Arc<dyn StorageAdapter>, clock: C) -> Self {
        Self {
            jwt_key: config.jwt_key.clone(),
            access_token_ttl: config.access_token_ttl(),
            refresh_token_ttl: config.refresh_token_ttl,
            refresh_rotation_grace: config.refresh_token_rotation_grace,
            handoff_token_ttl: config.handoff_token_ttl,
            mono_auth_token_ttl: config.mono_auth_token_ttl,
            deployment_mode: config.deployment_mode,
            storage,
            clock,
            handoff: HandoffRegistry::new(),
            rotation_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn mint_access_token(&self, workspace_id: &WorkspaceId) -> Result<String, AuthError> {
        access::mint_access_token(&self.jwt_key, workspace_id, self.clock.epoch_ms(), self.access_token_ttl)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        access::verify_access_token(&self.jwt_key, token, self.clock.epoch_ms())
    }

    /// Middleware entry point (spec.md §4.3): missing token →
    /// [`AuthError::TokenMissing`], invalid → [`AuthError::TokenInvalid`].
    pub fn resolve_workspace_token(&self, token: Option<&str>) -> Result<WorkspaceId, AuthError> {
        let token = token.ok_or(AuthError::TokenMissing)?;
        let claims = self.verify_access_token(token)?;
        WorkspaceId::parse(&claims.sub).map_err(AuthError::from)
    }

    /// Mints a brand-new `(access, refresh)` pair and persists the refresh
    /// token's hash as the workspace's current state, discarding any prior
    /// rotation chain. Used at workspace create/login and handoff/mono
    /// exchange.
    pub async fn issue_initial_pair(&self, workspace_id: &WorkspaceId) -> Result<TokenPair, AuthError> {
        let now_ms = self.clock.epoch_ms();
        let refresh_token = refresh::generate_refresh_token();
        let refresh_hash = refresh::hash_refresh_token(&refresh_token);
        let expires_at_ms = now_ms + self.refresh_token_ttl.as_millis() as u64;

        self.storage
            .save_workspace_refresh_token(
                workspace_id.as_str(),
                vibe80_core::RefreshTokenRecord {
                    workspace_id: workspace_id.clone(),
                    current_token_hash: refresh_hash,
                    current_expires_at_ms: expires_at_ms,
                    previous_token_hash: None,
                    previous_valid_until_ms: None,
                },
            )
            .await?;

        Ok(TokenPair {
            access_token: self.mint_access_token(workspace_id)?,
            refresh_token,
            refresh_expires_at_ms: expires_at_ms,
        })
    }

    /// Implements the rotation table of spec.md §4.3.
    pub async fn rotate_refresh_token(
        &self,
        workspace_id: &str,
        presented_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let now_ms = self.clock.epoch_ms();
        let presented_hash = refresh::hash_refresh_token(presented_token);
        let cache_key = (workspace_id.to_string(), presented_hash.clone());

        if let Some(cached) = self.rotation_cache.lock().get(&cache_key) {
            if cached.expires_at_ms > now_ms {
                return Ok(cached.pair.clone());
            }
        }

        let next_token = refresh::generate_refresh_token();
        let next_hash = refresh::hash_refresh_token(&next_token);
        let next_expires_at_ms = now_ms + self.refresh_token_ttl.as_millis() as u64;
        let grace_ms = self.refresh_rotation_grace.as_millis() as u64;

        let outcome = self
            .storage
            .rotate_workspace_refresh_token(
                workspace_id,
                &presented_hash,
                &next_hash,
                next_expires_at_ms,
                grace_ms,
                now_ms,
            )
            .await?;

        match outcome.decision {
            RotateDecision::Accept => {
                let pair = TokenPair {
                    access_token: self.mint_access_token(&WorkspaceId::parse(workspace_id)?)?,
                    refresh_token: next_token,
                    refresh_expires_at_ms: next_expires_at_ms,
                };
                self.rotation_cache.lock().insert(
                    cache_key,
                    CachedRotation { pair: pair.clone(), expires_at_ms: now_ms + grace_ms },
                );
                Ok(pair)
            }
            RotateDecision::AlreadyRotated => Err(AuthError::RefreshInvalid),
            RotateDecision::Reused => {
                tracing::warn!(workspace_id, "refresh token reuse detected, refresh state cleared");
                Err(AuthError::RefreshReused)
            }
            RotateDecision::Expired => Err(AuthError::RefreshExpired),
            RotateDecision::Unknown => Err(AuthError::RefreshInvalid),
        }
    }

    pub fn mint_handoff(&self, workspace_id: WorkspaceId, session_id: Option<SessionId>) -> vibe80_core::HandoffToken {
        self.handoff.mint_handoff(
            workspace_id,
            session_id,
            self.clock.epoch_ms(),
            self.handoff_token_ttl.as_millis() as u64,
        )
    }

    pub async fn consume_handoff(
        &self,
        token: &str,
    ) -> Result<(WorkspaceId, Option<SessionId>, TokenPair), AuthError> {
        let entry = self.handoff.consume_handoff(token, self.clock.epoch_ms())?;
        let pair = self.issue_initial_pair(&entry.workspace_id).await?;
        Ok((entry.workspace_id, entry.session_id, pair))
    }

    pub fn mint_mono(&self, workspace_id: WorkspaceId) -> Result<vibe80_core::MonoAuthToken, AuthError> {
        if self.deployment_mode != DeploymentMode::MonoUser {
            return Err(AuthError::MonoNotSingleTenant);
        }
        Ok(self.handoff.mint_mono(workspace_id, self.clock.epoch_ms(), self.mono_auth_token_ttl.as_millis() as u64))
    }

    pub async fn consume_mono(&self, token: &str) -> Result<(WorkspaceId, TokenPair), AuthError> {
        let entry = self.handoff.consume_mono(token, self.clock.epoch_ms())?;
        let pair = self.issue_initial_pair(&entry.workspace_id).await?;
        Ok((entry.workspace_id, pair))
    }

    /// Called periodically by the GC loop (C9) to drop expired in-memory
    /// handoff/mono tokens and rotation-cache entries.
    pub fn sweep(&self) {
        let now_ms = self.clock.epoch_ms();
        self.handoff.sweep(now_ms);
        self.rotation_cache.lock().retain(|_, cached| cached.expires_at_ms > now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::FakeClock;
    use vibe80_storage::MemoryStorageAdapter;

    fn manager() -> AuthManager<FakeClock> {
        std::env::set_var("JWT_KEY", "test-key");
        let config = Config::from_env().unwrap();
        std::env::remove_var("JWT_KEY");
        AuthManager::new(&config, Arc::new(MemoryStorageAdapter::new()), FakeClock::new())
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips() {
        let manager = manager();
        let workspace_id = WorkspaceId::generate();
        let pair = manager.issue_initial_pair(&workspace_id).await.unwrap();
        let resolved = manager.resolve_workspace_token(Some(&pair.access_token)).unwrap();
        assert_eq!(resolved, workspace_id);
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let manager = manager();
        assert!(matches!(manager.resolve_workspace_token(None), Err(AuthError::TokenMissing)));
    }

    #[tokio::test]
    async fn current_refresh_token_rotates_once() {
        let manager = manager();
        let workspace_id = WorkspaceId::generate();
        let pair = manager.issue_initial_pair(&workspace_id).await.unwrap();
        let rotated = manager.rotate_refresh_token(workspace_id.as_str(), &pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn concurrent_rotation_of_same_hash_returns_cached_pair() {
        let manager = manager();
        let workspace_id = WorkspaceId::generate();
        let pair = manager.issue_initial_pair(&workspace_id).await.unwrap();
        let first = manager.rotate_refresh_token(workspace_id.as_str(), &pair.refresh_token).await.unwrap();
        let second = manager.rotate_refresh_token(workspace_id.as_str(), &pair.refresh_token).await.unwrap();
        assert_eq!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn unrecognized_refresh_token_triggers_reuse_detection() {
        let manager = manager();
        let workspace_id = WorkspaceId::generate();
        let pair = manager.issue_initial_pair(&workspace_id).await.unwrap();
        let _ = manager.rotate_refresh_token(workspace_id.as_str(), &pair.refresh_token).await.unwrap();

        // Neither the current nor the (still-in-grace) previous hash: looks
        // like a forged or long-stale token, so all state is wiped.
        let bogus = refresh::generate_refresh_token();
        let err = manager.rotate_refresh_token(workspace_id.as_str(), &bogus).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshReused));

        let state = manager.storage.get_workspace_refresh_state(workspace_id.as_str()).await.unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn mono_token_requires_single_tenant_mode() {
        let manager = manager();
        assert!(matches!(
            manager.mint_mono(WorkspaceId::generate()),
            Err(AuthError::MonoNotSingleTenant)
        ));
    }
}
