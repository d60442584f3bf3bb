// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ProviderClient` capability surface (spec.md §4.6, §9 "polymorphism
//! over providers"): one trait, two variants (`vibe80_supervisor::codex`,
//! `vibe80_supervisor::claude`) behind it, rather than an inheritance
//! hierarchy.

use async_trait::async_trait;
use std::time::Duration;
use vibe80_core::Provider;
use vibe80_wire::{ExitReason, ProviderEvent};

use crate::error::SupervisorError;
pub use crate::turns::ClientStatus;

#[derive(Debug, Clone, Copy)]
pub struct StopOpts {
    pub force: bool,
    pub timeout: Duration,
    /// Why the caller is stopping the client, threaded through to the
    /// `exit` event the watcher emits rather than inferred from `force`
    /// (force is about signal escalation, not intent).
    pub reason: ExitReason,
}

impl Default for StopOpts {
    fn default() -> Self {
        Self::graceful(Duration::ZERO)
    }
}

impl StopOpts {
    pub fn graceful(timeout: Duration) -> Self {
        Self { force: false, timeout, reason: ExitReason::Requested }
    }

    pub fn forced() -> Self {
        Self { force: true, timeout: Duration::ZERO, reason: ExitReason::Requested }
    }

    /// Used by the idle-child GC sweep: the resulting exit must surface as
    /// `Stopped`, not `Crashed`.
    pub fn idle(timeout: Duration) -> Self {
        Self { force: false, timeout, reason: ExitReason::GcIdle }
    }
}

#[derive(Debug, Clone)]
pub struct TurnHandle {
    pub turn_id: String,
}

#[derive(Debug, Clone)]
pub struct ModelPage {
    pub models: Vec<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountLoginParams {
    pub extra: serde_json::Value,
}

/// Per-worktree child-process supervisor (spec.md §4.6 "Supervisor contract
/// (common)"). Implementations emit [`ProviderEvent`]s over the channel
/// they were constructed with rather than returning them, since events
/// arrive asynchronously and out of band with request/response calls.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Bootstraps the child and blocks until `ready` (or failure). Emits
    /// `thread_starting` then `ready{threadId}` on success.
    async fn start(&self) -> Result<(), SupervisorError>;

    /// Idempotent: a second call while already stopped is a no-op.
    async fn stop(&self, opts: StopOpts) -> Result<(), SupervisorError>;

    async fn send_turn(&self, text: String, attachments: Vec<String>) -> Result<TurnHandle, SupervisorError>;

    async fn interrupt_turn(&self, turn_id: &str) -> Result<(), SupervisorError>;

    async fn list_models(
        &self,
        cursor: Option<String>,
        limit: Option<u32>,
    ) -> Result<ModelPage, SupervisorError>;

    async fn set_default_model(
        &self,
        model: String,
        reasoning_effort: Option<String>,
    ) -> Result<(), SupervisorError>;

    async fn start_account_login(&self, params: AccountLoginParams) -> Result<(), SupervisorError>;

    /// Sets the restart-if-idle flag; acted upon the next time the active
    /// turn set empties out (spec.md §4.6 "Lifecycle").
    fn request_restart(&self);

    fn status(&self) -> ClientStatus;

    /// Exposed as a `fallibleCapability` per §9 "Interruption semantics"
    /// rather than a silent no-op.
    fn supports_interrupt(&self) -> bool {
        self.provider().supports_interrupt()
    }
}

/// Sink the variants push translated events onto. A `tokio::sync::mpsc`
/// sender in production; tests can substitute anything with the same
/// shape.
pub type EventSink = tokio::sync::mpsc::UnboundedSender<ProviderEvent>;
