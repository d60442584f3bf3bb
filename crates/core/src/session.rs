// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A cloned repository bound to one workspace, plus its implicit `main`
//! worktree.

use crate::id::{SessionId, WorkspaceId};
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Filesystem layout for a session (spec.md §6 persisted layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLayout {
    pub session_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub attachments_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub git_dir: PathBuf,
}

impl SessionLayout {
    /// Derive the standard layout for a session rooted at
    /// `<workspace_home>/vibe80_workspace/sessions/<sessionId>`.
    pub fn under(sessions_root: &Path, session_id: &SessionId) -> Self {
        let session_dir = sessions_root.join(session_id.as_str());
        Self {
            repo_dir: session_dir.join("repository"),
            attachments_dir: session_dir.join("attachments"),
            tmp_dir: session_dir.join("tmp"),
            git_dir: session_dir.join("git"),
            session_dir,
        }
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.session_dir.join("worktrees")
    }

    pub fn git_credentials_path(&self) -> PathBuf {
        self.session_dir.join("git-credentials")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub repo_url: String,
    pub layout: SessionLayout,
    pub active_provider: Provider,
    pub providers: Vec<Provider>,
    pub created_at_ms: u64,
    pub last_activity_at_ms: u64,
    pub default_internet_access: bool,
    pub default_deny_git_credentials_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl Session {
    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_at_ms = now_ms;
    }

    pub fn provider_enabled(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_layout_places_main_worktree_under_repo_dir() {
        let layout =
            SessionLayout::under(Path::new("/home/w/vibe80_workspace/sessions"), &SessionId::generate());
        assert!(layout.repo_dir.starts_with(&layout.session_dir));
        assert_eq!(layout.worktrees_dir(), layout.session_dir.join("worktrees"));
    }

    #[test]
    fn touch_updates_last_activity() {
        let mut session = Session {
            id: SessionId::generate(),
            workspace_id: WorkspaceId::generate(),
            repo_url: "https://example.test/repo.git".into(),
            layout: SessionLayout::under(Path::new("/tmp"), &SessionId::generate()),
            active_provider: Provider::Codex,
            providers: vec![Provider::Codex],
            created_at_ms: 0,
            last_activity_at_ms: 0,
            default_internet_access: true,
            default_deny_git_credentials_access: false,
            thread_id: None,
        };
        session.touch(42);
        assert_eq!(session.last_activity_at_ms, 42);
    }
}
