// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Every helper invocation records an audit entry (spec.md §4.1, §6). The
//! sink is injected so the executor itself stays oblivious to where a
//! workspace's `metadata/audit.log` lives.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub workspace_id: String,
    pub cwd: Option<String>,
    pub command: Vec<String>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timestamp_ms: u64,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Appends one JSON line per invocation to the invoking workspace's own
/// `<home_root>/<workspaceId>/vibe80_workspace/metadata/audit.log`, per
/// spec.md §6's per-workspace on-disk layout — one log per tenant, not a
/// single process-wide file.
pub struct FileAuditSink {
    home_root: PathBuf,
}

impl FileAuditSink {
    pub fn new(home_root: PathBuf) -> Self {
        Self { home_root }
    }

    fn path_for(&self, workspace_id: &str) -> PathBuf {
        self.home_root.join(workspace_id).join("vibe80_workspace").join("metadata").join("audit.log")
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: AuditEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize audit entry");
                return;
            }
        };
        let path = self.path_for(&entry.workspace_id);
        if let Some(parent) = path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::error!(error = %err, path = %parent.display(), "failed to create audit log dir");
                return;
            }
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await;
        match file {
            Ok(mut file) => {
                if let Err(err) = file.write_all(format!("{line}\n").as_bytes()).await {
                    tracing::error!(error = %err, path = %path.display(), "failed to append audit entry");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, path = %path.display(), "failed to open audit log");
            }
        }
    }
}

/// Used in tests and single-tenant bypass where no durable audit trail is
/// wired up yet.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _entry: AuditEntry) {}
}
