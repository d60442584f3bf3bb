// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Workspace Provisioner (C4, spec.md §4.4): allocates a host OS
//! identity for a workspace, lays out its home tree, and materializes
//! provider credentials.

use std::path::{Path, PathBuf};

use vibe80_core::{Clock, Provider, ProviderTable, Workspace, WorkspaceId};
use vibe80_exec::{ExecOpts, Executor};

use crate::credentials;
use crate::error::GitError;
use crate::uid;

/// Host-level provisioning, always run through a [`vibe80_exec::ExecutorMode::Bypass`]
/// executor: at create time no per-workspace sandbox exists yet to route
/// through the helper.
pub struct WorkspaceProvisioner<C: Clock> {
    executor: Executor<C>,
    home_root: PathBuf,
    uid_min: u32,
    uid_max: u32,
}

impl<C: Clock> WorkspaceProvisioner<C> {
    pub fn new(executor: Executor<C>, home_root: PathBuf, uid_min: u32, uid_max: u32) -> Self {
        Self { executor, home_root, uid_min, uid_max }
    }

    pub fn home_dir(&self, workspace_id: &WorkspaceId) -> PathBuf {
        self.home_root.join(workspace_id.as_str())
    }

    /// Allocates a uid, creates the OS user, lays out `<home>/vibe80_workspace/
    /// {metadata,sessions}`, and materializes any enabled provider's credentials.
    /// Returns the fully populated [`Workspace`] record for the caller to persist.
    pub async fn create(
        &self,
        workspace_id: WorkspaceId,
        providers: ProviderTable,
        secret: String,
        now_ms: u64,
    ) -> Result<Workspace, GitError> {
        for provider in Provider::ALL {
            providers
                .get(provider)
                .validate(provider)
                .map_err(|reason| GitError::InvalidProviderConfig { provider, reason })?;
        }

        let uid = uid::allocate_uid(&self.executor, self.uid_min, self.uid_max).await?;
        let home = self.home_dir(&workspace_id);

        self.create_os_user(&workspace_id, uid, &home).await?;
        self.lay_out_home(&home).await?;
        self.materialize_all(&providers, &home).await?;

        let workspace = Workspace {
            id: workspace_id,
            providers,
            secret,
            uid,
            gid: uid,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        self.persist_metadata(&workspace).await?;

        Ok(workspace)
    }

    /// Rewrites credential files and the provider table for an existing
    /// workspace. Rejects disabling a provider still referenced by any
    /// worktree in `active_providers_in_use`.
    pub async fn update(
        &self,
        workspace: &mut Workspace,
        providers: ProviderTable,
        active_providers_in_use: &[Provider],
        now_ms: u64,
    ) -> Result<(), GitError> {
        for provider in Provider::ALL {
            providers
                .get(provider)
                .validate(provider)
                .map_err(|reason| GitError::InvalidProviderConfig { provider, reason })?;
            if !providers.enabled(provider)
                && workspace.providers.enabled(provider)
                && active_providers_in_use.contains(&provider)
            {
                return Err(GitError::ProviderInUse(provider));
            }
        }

        let home = self.home_dir(&workspace.id);
        self.materialize_all(&providers, &home).await?;
        workspace.providers = providers;
        workspace.updated_at_ms = now_ms;
        self.persist_metadata(workspace).await?;
        Ok(())
    }

    /// Writes `metadata/workspace.secret` and `metadata/workspace.json`
    /// (spec.md §6's per-workspace on-disk layout), both mode 0600.
    async fn persist_metadata(&self, workspace: &Workspace) -> Result<(), GitError> {
        let metadata_dir = self.home_dir(&workspace.id).join("vibe80_workspace").join("metadata");
        credentials::write_private(&metadata_dir.join("workspace.secret"), workspace.secret.as_bytes()).await?;

        let config = serde_json::json!({
            "workspaceId": workspace.id.as_str(),
            "providers": workspace.providers,
            "uid": workspace.uid,
            "gid": workspace.gid,
            "updatedAt": workspace.updated_at_ms,
        });
        let body = serde_json::to_vec_pretty(&config)?;
        credentials::write_private(&metadata_dir.join("workspace.json"), &body).await?;
        Ok(())
    }

    async fn create_os_user(&self, workspace_id: &WorkspaceId, uid: u32, home: &Path) -> Result<(), GitError> {
        let argv = vec![
            "useradd".to_string(),
            "--uid".to_string(),
            uid.to_string(),
            "--home-dir".to_string(),
            home.display().to_string(),
            "--create-home".to_string(),
            "--no-user-group".to_string(),
            "--gid".to_string(),
            uid.to_string(),
            workspace_id.as_str().to_string(),
        ];
        self.exec(&argv).await
    }

    async fn lay_out_home(&self, home: &Path) -> Result<(), GitError> {
        let root = home.join("vibe80_workspace");
        for sub in ["metadata", "sessions"] {
            tokio::fs::create_dir_all(root.join(sub)).await?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&root).await?.permissions();
            perms.set_mode(0o700);
            tokio::fs::set_permissions(&root, perms).await?;
        }
        Ok(())
    }

    async fn materialize_all(&self, providers: &ProviderTable, home: &Path) -> Result<(), GitError> {
        for provider in Provider::ALL {
            let config = providers.get(provider);
            if !config.enabled {
                continue;
            }
            let auth = config.auth.as_ref().ok_or(GitError::MissingCredentials(provider))?;
            credentials::materialize(provider, auth, home).await?;
        }
        Ok(())
    }

    async fn exec(&self, argv: &[String]) -> Result<(), GitError> {
        let out = self.executor.run("host", argv, &ExecOpts::default()).await?;
        if !out.success() {
            return Err(GitError::CommandFailed {
                command: argv.join(" "),
                status: out.exit_code.unwrap_or(-1),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::{ProviderAuth, ProviderAuthType, ProviderConfig, SystemClock};

    fn provisioner(home_root: PathBuf) -> WorkspaceProvisioner<SystemClock> {
        WorkspaceProvisioner::new(Executor::bypass(SystemClock), home_root, 100_000, 200_000)
    }

    #[tokio::test]
    async fn rejects_enabled_provider_without_auth() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = provisioner(dir.path().to_path_buf());
        let mut providers = ProviderTable::default();
        providers.codex = ProviderConfig { enabled: true, auth: None };
        let err = provisioner
            .create(WorkspaceId::generate(), providers, "secret".into(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::InvalidProviderConfig { provider: Provider::Codex, .. }));
    }

    #[tokio::test]
    async fn update_rejects_disabling_provider_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = provisioner(dir.path().to_path_buf());
        let mut workspace = Workspace {
            id: WorkspaceId::generate(),
            providers: {
                let mut p = ProviderTable::default();
                p.claude = ProviderConfig {
                    enabled: true,
                    auth: Some(ProviderAuth { auth_type: ProviderAuthType::ApiKey, value: "x".into() }),
                };
                p
            },
            secret: "s".into(),
            uid: 100_000,
            gid: 100_000,
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        let disabled = ProviderTable::default();
        let err = provisioner
            .update(&mut workspace, disabled, &[Provider::Claude], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::ProviderInUse(Provider::Claude)));
    }
}
