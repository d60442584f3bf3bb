// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Executor::stream` — the long-lived half of the Sandboxed Executor
//! contract, used by the Provider Client Supervisor to host a Codex or
//! Claude child. A reaper task (grounded on the same pattern used for the
//! helper process itself) waits on exit so the child never zombies.

use crate::audit::AuditEntry;
use crate::error::ExecError;
use crate::policy::ExecOpts;
use crate::run::Executor;
use nix::sys::signal::{self, Signal};
use vibe80_core::Clock;
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A running child plus the handles its owner (the supervisor) needs to
/// drive it. `resize` is intentionally absent: TTY passthrough is out of
/// scope here. The `Child` itself is owned by a reaper task so the process
/// is always waited on; this handle keeps the pid for signalling and a
/// oneshot that resolves once the reaper observes exit.
pub struct StreamHandle {
    pid: u32,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    exit_rx: oneshot::Receiver<ExitInfo>,
}

impl StreamHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Sends `signal` to the child. Callers escalate SIGTERM -> SIGKILL
    /// themselves per the `stop({force, timeoutMs})` contract (spec.md §4.6).
    pub fn kill(&self, sig: Signal) -> Result<(), ExecError> {
        signal::kill(Pid::from_raw(self.pid as i32), sig)
            .map_err(|e| ExecError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    }

    /// Resolves once the reaper task observes the child's exit.
    pub async fn wait_exit(self) -> Result<ExitInfo, ExecError> {
        self.exit_rx.await.map_err(|_| ExecError::AlreadyExited)
    }

    /// Breaks the handle into its parts so a caller can hand stdin/stdout/
    /// stderr to independent reader/writer tasks while still awaiting exit
    /// on the side (the Provider Client Supervisor's long-lived children,
    /// spec.md §4.6).
    pub fn split(self) -> (u32, ChildStdin, ChildStdout, ChildStderr, oneshot::Receiver<ExitInfo>) {
        (self.pid, self.stdin, self.stdout, self.stderr, self.exit_rx)
    }
}

impl<C: Clock> Executor<C> {
    /// `stream(workspaceId, argv, opts) -> {stdin, stdout, stderr, waitExit, kill}`.
    pub async fn stream(
        &self,
        workspace_id: &str,
        argv: &[String],
        opts: &ExecOpts,
    ) -> Result<StreamHandle, ExecError> {
        if let Some(cwd) = &opts.cwd {
            if !cwd.exists() {
                return Err(ExecError::CwdMissing(cwd.display().to_string()));
            }
        }

        let mut command = self.build_command(workspace_id, argv, opts);
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|source| ExecError::SpawnFailed { workspace_id: workspace_id.to_string(), source })?;

        let pid = child.id().ok_or(ExecError::AlreadyExited)?;
        let stdin = child.stdin.take().ok_or(ExecError::MissingStdio)?;
        let stdout = child.stdout.take().ok_or(ExecError::MissingStdio)?;
        let stderr = child.stderr.take().ok_or(ExecError::MissingStdio)?;

        let (exit_tx, exit_rx) = oneshot::channel();
        let audit = self.audit();
        let clock = self.clock();
        let reaper_workspace_id = workspace_id.to_string();
        let reaper_command = argv.to_vec();
        let reaper_cwd = opts.cwd.as_ref().map(|p| p.display().to_string());

        tokio::spawn(async move {
            let status = child.wait().await;
            let (code, signal) = match &status {
                Ok(status) => (status.code(), status.signal()),
                Err(err) => {
                    tracing::error!(workspace_id = %reaper_workspace_id, error = %err, "failed to wait on child");
                    (None, None)
                }
            };
            audit
                .record(AuditEntry {
                    workspace_id: reaper_workspace_id,
                    cwd: reaper_cwd,
                    command: reaper_command,
                    exit_code: code,
                    signal,
                    timestamp_ms: clock.epoch_ms(),
                })
                .await;
            let _ = exit_tx.send(ExitInfo { code, signal });
        });

        Ok(StreamHandle { pid, stdin, stdout, stderr, exit_rx })
    }
}
