// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared, `Arc`-wrapped process state threaded through every daemon
//! component constructor (§9 "global mutable state", SPEC_FULL.md §10.3).
//! Grounded on the donor's `ListenCtx` (`daemon_old::listener::ListenCtx`):
//! one struct carrying everything a connection handler or dispatch call
//! needs, built once at boot and cloned cheaply via `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use vibe80_auth::AuthManager;
use vibe80_core::{Clock, Config};
use vibe80_exec::{AuditSink, Executor};
use vibe80_git::WorkspaceProvisioner;
use vibe80_storage::StorageAdapter;

use crate::clients::{ClientFactory, DefaultClientFactory};
use crate::conn::ConnRegistry;
use crate::registry::SessionRegistry;

/// Everything a dispatch call, a fan-out connection, or a GC sweep needs.
pub struct Context<C: Clock> {
    pub config: Arc<Config>,
    pub storage: Arc<dyn StorageAdapter>,
    pub auth: Arc<AuthManager<C>>,
    /// Every per-workspace command (git, provider children) runs through
    /// the helper in multi-user mode (spec.md §4.1).
    pub helper_executor: Arc<Executor<C>>,
    /// Host-privileged: workspace creation runs before any sandbox exists
    /// to route through (spec.md §4.4).
    pub bypass_executor: Arc<Executor<C>>,
    pub provisioner: Arc<WorkspaceProvisioner<C>>,
    pub sessions: Arc<SessionRegistry>,
    pub conns: Arc<ConnRegistry>,
    /// Builds provider clients for `clients::ensure_for`. Swappable so
    /// tests can script a provider's behavior instead of spawning a real
    /// child process.
    pub client_factory: Arc<dyn ClientFactory<C>>,
    pub clock: C,
}

impl<C: Clock + Send + Sync + 'static> Context<C> {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn StorageAdapter>,
        auth: Arc<AuthManager<C>>,
        audit: Arc<dyn AuditSink>,
        clock: C,
    ) -> Self {
        let helper_executor = Arc::new(Executor::helper(clock.clone(), audit.clone()));
        let bypass_executor = Arc::new(Executor::bypass(clock.clone()));
        let provisioner = Arc::new(WorkspaceProvisioner::new(
            Executor::bypass(clock.clone()),
            config.workspace_home_base.clone(),
            config.workspace_uid_min,
            config.workspace_uid_max,
        ));
        let sessions = Arc::new(SessionRegistry::new(storage.clone()));
        Self {
            config,
            storage,
            auth,
            helper_executor,
            bypass_executor,
            provisioner,
            sessions,
            conns: Arc::new(ConnRegistry::new()),
            client_factory: Arc::new(DefaultClientFactory),
            clock,
        }
    }

    pub fn provider_log_dir(&self) -> PathBuf {
        self.config.provider_log_directory.clone()
    }
}
