// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materializing provider credentials into the files each provider CLI
//! reads on its own (spec.md §4.4). The inverse of the fallback-chain
//! resolution a provider's own CLI does at startup — we write exactly the
//! files it would otherwise look for.

use std::path::Path;

use base64::Engine;
use serde_json::json;
use vibe80_core::{Provider, ProviderAuth, ProviderAuthType};

use crate::error::GitError;

/// Writes whatever credential file `provider` expects under `home_dir`,
/// creating parent directories as needed and setting mode 0600 on the file.
pub async fn materialize(provider: Provider, auth: &ProviderAuth, home_dir: &Path) -> Result<(), GitError> {
    if !auth.auth_type.valid_for(provider) {
        return Err(GitError::UnsupportedAuthType(provider));
    }
    match (provider, auth.auth_type) {
        (Provider::Codex, ProviderAuthType::AuthJsonB64) => {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(auth.value.as_bytes())
                .map_err(|e| GitError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
            write_private(&home_dir.join(".codex").join("auth.json"), &decoded).await
        }
        (Provider::Codex, ProviderAuthType::ApiKey) => {
            let body = json!({ "OPENAI_API_KEY": auth.value });
            write_private(&home_dir.join(".codex").join("auth.json"), body.to_string().as_bytes()).await
        }
        (Provider::Claude, ProviderAuthType::SetupToken) => {
            let body = json!({ "claudeAiOauth": { "accessToken": auth.value } });
            write_private(&home_dir.join(".claude").join(".credentials.json"), body.to_string().as_bytes()).await
        }
        (Provider::Claude, ProviderAuthType::ApiKey) => {
            let body = json!({ "primaryApiKey": auth.value });
            write_private(&home_dir.join(".claude.json"), body.to_string().as_bytes()).await
        }
        _ => Err(GitError::UnsupportedAuthType(provider)),
    }
}

pub(crate) async fn write_private(path: &Path, content: &[u8]) -> Result<(), GitError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    set_owner_only(path).await?;
    Ok(())
}

#[cfg(unix)]
async fn set_owner_only(path: &Path) -> Result<(), GitError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_owner_only(_path: &Path) -> Result<(), GitError> {
    Ok(())
}
