// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two agent backends a worktree can be bound to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two supported agent-CLI backends (spec.md glossary: "Provider").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// The JSON-RPC 2.0 app-server.
    Codex,
    /// The line-delimited NDJSON CLI.
    Claude,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Codex, Provider::Claude];

    /// The provider a `switch_provider` request should land on when toggling
    /// away from `self`.
    pub fn other(self) -> Provider {
        match self {
            Provider::Codex => Provider::Claude,
            Provider::Claude => Provider::Codex,
        }
    }

    pub fn supports_interrupt(self) -> bool {
        matches!(self, Provider::Codex)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Codex => f.write_str("codex"),
            Provider::Claude => f.write_str("claude"),
        }
    }
}

/// The auth mechanism a provider credential uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAuthType {
    ApiKey,
    /// Codex-only: a base64-encoded `auth.json` blob.
    AuthJsonB64,
    /// Claude-only: a one-shot setup token exchanged for OAuth credentials.
    SetupToken,
}

impl ProviderAuthType {
    /// Whether this auth type is valid for the given provider (C4 validation rules).
    pub fn valid_for(self, provider: Provider) -> bool {
        match provider {
            Provider::Codex => matches!(self, ProviderAuthType::ApiKey | ProviderAuthType::AuthJsonB64),
            Provider::Claude => matches!(self, ProviderAuthType::ApiKey | ProviderAuthType::SetupToken),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAuth {
    #[serde(rename = "type")]
    pub auth_type: ProviderAuthType,
    pub value: String,
}

/// Per-provider credential configuration held on a [`crate::Workspace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ProviderAuth>,
}

impl ProviderConfig {
    pub fn disabled() -> Self {
        Self { enabled: false, auth: None }
    }

    /// C4 validation: `enabled=true` requires non-empty `auth`, and the auth
    /// type must be one this provider accepts.
    pub fn validate(&self, provider: Provider) -> Result<(), &'static str> {
        if !self.enabled {
            return Ok(());
        }
        let auth = self.auth.as_ref().ok_or("enabled provider requires auth")?;
        if auth.value.is_empty() {
            return Err("auth value must not be empty");
        }
        if !auth.auth_type.valid_for(provider) {
            return Err("auth type not valid for this provider");
        }
        Ok(())
    }
}

/// Per-workspace table of provider configuration, keyed by provider.
///
/// Kept as an explicit struct rather than `HashMap<Provider, _>` so it
/// serializes as `{"codex": {...}, "claude": {...}}` without relying on
/// enum-keyed JSON maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderTable {
    #[serde(default = "ProviderConfig::disabled")]
    pub codex: ProviderConfig,
    #[serde(default = "ProviderConfig::disabled")]
    pub claude: ProviderConfig,
}

impl ProviderTable {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Codex => &self.codex,
            Provider::Claude => &self.claude,
        }
    }

    pub fn get_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::Codex => &mut self.codex,
            Provider::Claude => &mut self.claude,
        }
    }

    pub fn enabled(&self, provider: Provider) -> bool {
        self.get(provider).enabled
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_toggles_between_providers() {
        assert_eq!(Provider::Codex.other(), Provider::Claude);
        assert_eq!(Provider::Claude.other(), Provider::Codex);
    }

    #[test]
    fn claude_does_not_support_interrupt() {
        assert!(!Provider::Claude.supports_interrupt());
        assert!(Provider::Codex.supports_interrupt());
    }

    #[test]
    fn enabled_provider_requires_auth() {
        let cfg = ProviderConfig { enabled: true, auth: None };
        assert!(cfg.validate(Provider::Codex).is_err());
    }

    #[test]
    fn setup_token_invalid_for_codex() {
        let cfg = ProviderConfig {
            enabled: true,
            auth: Some(ProviderAuth { auth_type: ProviderAuthType::SetupToken, value: "x".into() }),
        };
        assert!(cfg.validate(Provider::Codex).is_err());
        assert!(cfg.validate(Provider::Claude).is_ok());
    }
}
