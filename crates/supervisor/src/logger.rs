// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The optional provider logger (spec.md §4.6 "Provider logger"): when
//! `ACTIVATE_PROVIDER_LOG=1`, every stdin/stdout/stderr line a child emits
//! is appended to `<logdir>/<provider>_<sessionId>_<worktreeId>.log`,
//! prefixed `IN::`/`OUT::`/`ERR::`. Never logs secrets — it only ever sees
//! already-framed protocol lines, never credential material.

use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDirection {
    In,
    Out,
    Err,
}

impl LogDirection {
    fn prefix(self) -> &'static str {
        match self {
            LogDirection::In => "IN::",
            LogDirection::Out => "OUT::",
            LogDirection::Err => "ERR::",
        }
    }
}

pub struct ProviderLogger {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl ProviderLogger {
    /// `<logdir>/<provider>_<sessionId>_<worktreeId>.log`, directory mode
    /// 0700, file mode 0600 (spec.md §4.6).
    pub fn new(log_dir: &Path, provider: &str, session_id: &str, worktree_id: &str) -> Self {
        let path = log_dir.join(format!("{provider}_{session_id}_{worktree_id}.log"));
        Self { path, file: Mutex::new(None) }
    }

    pub async fn log(&self, direction: LogDirection, line: &str) {
        if let Err(err) = self.write(direction, line).await {
            tracing::warn!(path = %self.path.display(), error = %err, "provider log write failed");
        }
    }

    async fn write(&self, direction: LogDirection, line: &str) -> std::io::Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
                set_dir_mode(parent).await?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
            set_file_mode(&self.path).await?;
            *guard = Some(file);
        }
        let file = guard.as_mut().expect("just initialized above");
        file.write_all(direction.prefix().as_bytes()).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[cfg(unix)]
async fn set_dir_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await
}

#[cfg(not(unix))]
async fn set_dir_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn set_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_prefixed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ProviderLogger::new(dir.path(), "codex", "s1", "main");
        logger.log(LogDirection::In, "{\"method\":\"turn/send\"}").await;
        logger.log(LogDirection::Out, "{\"id\":1}").await;
        let contents = tokio::fs::read_to_string(dir.path().join("codex_s1_main.log")).await.unwrap();
        assert!(contents.contains("IN::{\"method\":\"turn/send\"}"));
        assert!(contents.contains("OUT::{\"id\":1}"));
    }
}
