// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Executor::run` — the single-shot half of the Sandboxed Executor
//! contract (spec.md §4.1).

use crate::audit::{AuditEntry, AuditSink, NullAuditSink};
use crate::error::ExecError;
use crate::helper::{build_helper_argv, DEFAULT_HELPER_BIN};
use crate::policy::ExecOpts;
use std::os::unix::process::ExitStatusExt;
use std::sync::Arc;
use vibe80_core::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorMode {
    /// Multi-tenant: every invocation goes through the privileged helper.
    Helper,
    /// Single-tenant: the executor bypasses the helper and spawns with the
    /// parent process's own identity (spec.md §4.1 final paragraph).
    Bypass,
}

pub struct Executor<C: Clock = vibe80_core::SystemClock> {
    mode: ExecutorMode,
    helper_bin: String,
    audit: Arc<dyn AuditSink>,
    clock: C,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl<C: Clock> Executor<C> {
    pub fn helper(clock: C, audit: Arc<dyn AuditSink>) -> Self {
        Self { mode: ExecutorMode::Helper, helper_bin: DEFAULT_HELPER_BIN.to_string(), audit, clock }
    }

    pub fn bypass(clock: C) -> Self {
        Self { mode: ExecutorMode::Bypass, helper_bin: String::new(), audit: Arc::new(NullAuditSink), clock }
    }

    pub fn mode(&self) -> ExecutorMode {
        self.mode
    }

    /// `run(workspaceId, argv, opts) -> {stdout, stderr, exit}`.
    pub async fn run(
        &self,
        workspace_id: &str,
        argv: &[String],
        opts: &ExecOpts,
    ) -> Result<RunOutput, ExecError> {
        if let Some(cwd) = &opts.cwd {
            if !cwd.exists() {
                return Err(ExecError::CwdMissing(cwd.display().to_string()));
            }
        }
        let mut command = self.build_command(workspace_id, argv, opts);
        let output = command
            .output()
            .await
            .map_err(|source| ExecError::SpawnFailed { workspace_id: workspace_id.to_string(), source })?;

        let exit_code = output.status.code();
        let exit_signal = output.status.signal();

        self.audit
            .record(AuditEntry {
                workspace_id: workspace_id.to_string(),
                cwd: opts.cwd.as_ref().map(|p| p.display().to_string()),
                command: argv.to_vec(),
                exit_code,
                signal: exit_signal,
                timestamp_ms: self.clock.epoch_ms(),
            })
            .await;

        Ok(RunOutput { stdout: output.stdout, stderr: output.stderr, exit_code, exit_signal })
    }

    pub(crate) fn build_command(
        &self,
        workspace_id: &str,
        argv: &[String],
        opts: &ExecOpts,
    ) -> tokio::process::Command {
        match self.mode {
            ExecutorMode::Helper => {
                let helper_argv = build_helper_argv(workspace_id, opts, argv);
                let mut cmd = tokio::process::Command::new(&self.helper_bin);
                cmd.args(helper_argv);
                cmd
            }
            ExecutorMode::Bypass => {
                let mut cmd = tokio::process::Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                if let Some(cwd) = &opts.cwd {
                    cmd.current_dir(cwd);
                }
                for (key, value) in opts.whitelisted_env() {
                    cmd.env(key, value);
                }
                cmd
            }
        }
    }

    pub(crate) fn audit(&self) -> Arc<dyn AuditSink> {
        self.audit.clone()
    }

    pub(crate) fn clock(&self) -> C {
        self.clock.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::SystemClock;

    #[tokio::test]
    async fn bypass_mode_runs_directly() {
        let executor = Executor::bypass(SystemClock);
        let opts = ExecOpts::default();
        let out = executor.run("w1", &["true".to_string()], &opts).await.unwrap();
        assert!(out.success());
    }

    #[tokio::test]
    async fn missing_cwd_is_rejected() {
        let executor = Executor::bypass(SystemClock);
        let opts = ExecOpts { cwd: Some("/no/such/dir".into()), ..Default::default() };
        let err = executor.run("w1", &["true".to_string()], &opts).await.unwrap_err();
        assert!(matches!(err, ExecError::CwdMissing(_)));
    }
}
