// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy shapes the core hands to the privileged helper. The core
//! never enforces any of this itself — it only describes intent.

use crate::error::ExecError;
use std::path::PathBuf;

/// Env vars the helper is permitted to forward into the child (spec.md §4.1).
pub const ENV_WHITELIST: &[&str] = &[
    "GIT_SSH_COMMAND",
    "GIT_CONFIG_GLOBAL",
    "GIT_TERMINAL_PROMPT",
    "TERM",
    "TMPDIR",
    "CLAUDE_CODE_TMPDIR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetMode {
    None,
    /// `tcp:22,53,443` — enough for SSH, DNS, HTTPS.
    TcpLimited,
    Full,
}

impl NetMode {
    pub fn as_helper_arg(self) -> &'static str {
        match self {
            NetMode::None => "none",
            NetMode::TcpLimited => "tcp:22,53,443",
            NetMode::Full => "full",
        }
    }
}

/// Filesystem/network isolation intent for a single invocation.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    pub repo_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub attachments_dir: PathBuf,
    pub internet_access: bool,
    pub net_mode: NetMode,
    pub extra_allow_rw: Vec<PathBuf>,
    pub extra_allow_rw_files: Vec<PathBuf>,
}

impl SandboxPolicy {
    /// Invariant from spec.md §4.1: `internetAccess=false` requires denying
    /// git-credential access, which callers encode via `net_mode`/allow-lists
    /// before this policy is built. We only check the coarse invariant here.
    pub fn validate(&self, deny_git_credentials_access: bool) -> Result<(), ExecError> {
        if !self.internet_access && !deny_git_credentials_access {
            return Err(ExecError::InconsistentPolicy);
        }
        Ok(())
    }
}

/// Options shared by `run` and `stream` (spec.md §4.1 `opts`).
#[derive(Debug, Clone, Default)]
pub struct ExecOpts {
    pub cwd: Option<PathBuf>,
    /// Only keys in [`ENV_WHITELIST`] are forwarded by the helper; others
    /// are dropped silently here rather than at the helper boundary, so
    /// callers see consistent behavior in bypass mode too.
    pub env: Vec<(String, String)>,
    pub sandbox: Option<SandboxPolicy>,
}

impl ExecOpts {
    pub fn whitelisted_env(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .filter(|(k, _)| ENV_WHITELIST.contains(&k.as_str()))
            .cloned()
            .collect()
    }
}
