// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tenant boundary: a workspace maps 1:1 onto a host OS identity.

use crate::id::WorkspaceId;
use crate::provider::{Provider, ProviderTable};
use serde::{Deserialize, Serialize};

/// A tenant. `workspaceId <-> (uid, gid)` is stable for the workspace's
/// lifetime (spec.md §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub providers: ProviderTable,
    /// 32 random bytes, hex-encoded. Compared directly — never hashed.
    pub secret: String,
    pub uid: u32,
    pub gid: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Workspace {
    pub fn provider_enabled(&self, provider: Provider) -> bool {
        self.providers.enabled(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;

    fn sample() -> Workspace {
        Workspace {
            id: WorkspaceId::generate(),
            providers: ProviderTable::default(),
            secret: "deadbeef".into(),
            uid: 10000,
            gid: 10000,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn provider_config_defaults_to_disabled() {
        let ws = sample();
        assert!(!ws.provider_enabled(Provider::Codex));
    }

    #[test]
    fn provider_enabled_reflects_table() {
        let mut ws = sample();
        ws.providers.claude = ProviderConfig { enabled: true, auth: None };
        assert!(ws.provider_enabled(Provider::Claude));
        assert!(!ws.provider_enabled(Provider::Codex));
    }
}
