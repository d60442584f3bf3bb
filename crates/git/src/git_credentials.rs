// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped git credential materialization (spec.md §4.5): HTTP
//! credentials via a `git-credential-store` file, or an SSH key plus a
//! host-scoped `ssh_config`/`known_hosts` pair.

use std::path::Path;

use vibe80_core::{Clock, SessionLayout};
use vibe80_exec::{ExecOpts, Executor};

use crate::error::GitError;
use crate::run::run_git;

/// Writes `<session>/git-credentials` in `store` format and points the
/// session repo's `credential.helper` at it.
pub async fn materialize_http<C: Clock>(
    executor: &Executor<C>,
    layout: &SessionLayout,
    repo_url: &str,
    username: &str,
    password: &str,
) -> Result<(), GitError> {
    let parsed = url::Url::parse(repo_url).map_err(|e| GitError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
    let scheme = parsed.scheme();
    let host = parsed.host_str().ok_or_else(|| {
        GitError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "repo url has no host"))
    })?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();

    let line = format!(
        "{scheme}://{}:{}@{host}{port}\n",
        urlencode(username),
        urlencode(password)
    );
    let path = layout.git_credentials_path();
    write_private(&path, line.as_bytes()).await?;

    run_git(
        executor,
        &layout.repo_dir,
        &["config".into(), "credential.helper".into(), format!("store --file={}", path.display())],
    )
    .await
}

/// Writes an SSH private key plus a host-scoped `ssh_config`/`known_hosts`
/// pair under `<session>/git`, then points `core.sshCommand` at them.
pub async fn materialize_ssh<C: Clock>(
    executor: &Executor<C>,
    layout: &SessionLayout,
    host: &str,
    private_key: &str,
) -> Result<(), GitError> {
    let key_path = layout.git_dir.join("id_session");
    write_private(&key_path, private_key.as_bytes()).await?;

    let known_hosts_path = layout.git_dir.join("known_hosts");
    seed_known_hosts(executor, host, &known_hosts_path).await?;

    let config_path = layout.git_dir.join("ssh_config");
    let config = format!(
        "Host {host}\n    HostName {host}\n    IdentityFile {}\n    UserKnownHostsFile {}\n    StrictHostKeyChecking yes\n",
        key_path.display(),
        known_hosts_path.display(),
    );
    tokio::fs::create_dir_all(&layout.git_dir).await?;
    tokio::fs::write(&config_path, config).await?;

    run_git(
        executor,
        &layout.repo_dir,
        &["config".into(), "core.sshCommand".into(), format!("ssh -F {}", config_path.display())],
    )
    .await
}

async fn seed_known_hosts<C: Clock>(executor: &Executor<C>, host: &str, path: &Path) -> Result<(), GitError> {
    let argv = vec!["ssh-keyscan".to_string(), "-H".to_string(), host.to_string()];
    let out = executor.run("host", &argv, &ExecOpts::default()).await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &out.stdout).await?;
    Ok(())
}

async fn write_private(path: &Path, content: &[u8]) -> Result<(), GitError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }
    Ok(())
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
