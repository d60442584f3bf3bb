//! Shared fixtures for the end-to-end scenarios of spec.md §8, run against
//! in-memory/fake adapters per SPEC_FULL.md §10.5: an in-memory `Storage`,
//! a `FakeClock`, and scripted provider children (`FakeProviderClient`)
//! substituted for `vibe80d::clients::ensure_for`'s real `CodexClient`/
//! `ClaudeClient` construction via the `ClientFactory` seam.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use vibe80_auth::AuthManager;
use vibe80_core::{Config, FakeClock, Provider, Session, SessionId, SessionLayout, Worktree, WorktreeId, WorktreeStatus};
use vibe80_exec::NullAuditSink;
use vibe80_storage::MemoryStorageAdapter;
use vibe80_supervisor::{
    AccountLoginParams, ClientStatus, ModelPage, ProviderClient, StopOpts, SupervisorError, TurnHandle,
};
use vibe80_wire::{ExitReason, ProviderEvent};
use vibe80d::{ClientFactory, ClientSpec, Context};

/// Builds a `Config` from a fixed `JWT_KEY` without touching the real
/// filesystem default (`/etc/vibe80/jwt.key`). Callers must hold the
/// `serial_test::serial("env")` lock, since `Config::from_env` reads
/// process-global environment state.
pub fn test_config() -> Config {
    std::env::set_var("JWT_KEY", "test-suite-key");
    let config = Config::from_env().expect("fixed-env config must parse");
    std::env::remove_var("JWT_KEY");
    config
}

pub fn sample_session(session_id: &SessionId, providers: Vec<Provider>) -> Session {
    Session {
        id: session_id.clone(),
        workspace_id: vibe80_core::WorkspaceId::generate(),
        repo_url: "https://example.test/repo.git".into(),
        layout: SessionLayout::under(&PathBuf::from("/tmp/vibe80-specs"), session_id),
        active_provider: providers.first().copied().unwrap_or(Provider::Codex),
        providers,
        created_at_ms: 1_700_000_000_000,
        last_activity_at_ms: 1_700_000_000_000,
        default_internet_access: true,
        default_deny_git_credentials_access: false,
        thread_id: None,
    }
}

pub fn sample_worktree(id: WorktreeId, provider: Provider) -> Worktree {
    Worktree {
        id,
        branch_name: "wt-main".into(),
        path: PathBuf::from("/tmp/vibe80-specs/worktrees/main"),
        provider,
        status: WorktreeStatus::Ready,
        thread_id: None,
        color: "#10b981".into(),
        created_at_ms: 1_700_000_000_000,
        last_activity_at_ms: 1_700_000_000_000,
        parent_worktree_id: None,
        internet_access: None,
        deny_git_credentials_access: None,
    }
}

/// Yields to the executor enough times for the background event-pump task
/// (`vibe80d::clients::spawn_event_pump`) to drain whatever a provider
/// client just pushed onto its sink and broadcast it to sockets, before a
/// test reads those sockets back.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Assembles a `Context<FakeClock>` wired to in-memory storage and a
/// [`FakeClientFactory`], so a test can drive `vibe80d::dispatch::handle`
/// without spawning real child processes.
pub fn build_context(factory: Arc<FakeClientFactory>) -> Arc<Context<FakeClock>> {
    let config = Arc::new(test_config());
    let storage: Arc<dyn vibe80_storage::StorageAdapter> = Arc::new(MemoryStorageAdapter::new());
    let clock = FakeClock::new();
    let auth = Arc::new(AuthManager::new(&config, storage.clone(), clock.clone()));
    let audit: Arc<dyn vibe80_exec::AuditSink> = Arc::new(NullAuditSink);
    let mut context = Context::new(config, storage, auth, audit, clock);
    context.client_factory = factory;
    Arc::new(context)
}

/// Scripted stand-in for `CodexClient`/`ClaudeClient`. Each instance is
/// bound to one worktree's `EventSink` and records just enough state
/// (status, turn counter, pending restart) to drive the supervisor
/// contract's observable behavior (spec.md §4.6) without a real child.
pub struct FakeProviderClient {
    provider: Provider,
    sink: vibe80_supervisor::EventSink,
    status: Mutex<ClientStatus>,
    thread_id: String,
    turn_counter: AtomicU64,
    restart_requested: AtomicBool,
    auto_complete: bool,
}

impl FakeProviderClient {
    fn new(provider: Provider, sink: vibe80_supervisor::EventSink, auto_complete: bool) -> Self {
        Self {
            provider,
            sink,
            status: Mutex::new(ClientStatus::Starting),
            thread_id: format!("thread-{provider}"),
            turn_counter: AtomicU64::new(0),
            restart_requested: AtomicBool::new(false),
            auto_complete,
        }
    }

    pub fn status(&self) -> ClientStatus {
        *self.status.lock()
    }

    /// Manual-mode completion: emits the assistant message and
    /// `turn_completed` for `turn_id`, then performs a deferred restart if
    /// one was requested while the turn was outstanding (spec.md §4.6
    /// "restart-if-idle").
    pub fn complete_turn(&self, turn_id: &str, text: &str) {
        let _ = self.sink.send(ProviderEvent::AssistantDelta {
            turn_id: turn_id.to_string(),
            item_id: "item-1".into(),
            delta: text.to_string(),
        });
        let _ = self.sink.send(ProviderEvent::AssistantMessage {
            turn_id: turn_id.to_string(),
            item_id: "item-1".into(),
            text: text.to_string(),
        });
        let _ = self.sink.send(ProviderEvent::TurnCompleted { turn_id: turn_id.to_string() });
        *self.status.lock() = ClientStatus::Idle;
        if self.restart_requested.load(Ordering::SeqCst) {
            self.perform_restart();
        }
    }

    fn perform_restart(&self) {
        *self.status.lock() = ClientStatus::Restarting;
        let _ = self.sink.send(ProviderEvent::Exit { code: Some(0), signal: None, reason: ExitReason::Requested });
        let _ = self.sink.send(ProviderEvent::Ready { thread_id: self.thread_id.clone() });
        *self.status.lock() = ClientStatus::Idle;
        self.restart_requested.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn start(&self) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::ThreadStarting);
        let _ = self.sink.send(ProviderEvent::Ready { thread_id: self.thread_id.clone() });
        *self.status.lock() = ClientStatus::Idle;
        Ok(())
    }

    async fn stop(&self, opts: StopOpts) -> Result<(), SupervisorError> {
        *self.status.lock() = ClientStatus::Stopping;
        let _ = self.sink.send(ProviderEvent::Exit { code: Some(0), signal: None, reason: opts.reason });
        Ok(())
    }

    async fn send_turn(&self, text: String, _attachments: Vec<String>) -> Result<TurnHandle, SupervisorError> {
        let turn_id = format!("turn-{}", self.turn_counter.fetch_add(1, Ordering::SeqCst));
        *self.status.lock() = ClientStatus::Busy;
        let _ = self.sink.send(ProviderEvent::TurnStarted { turn_id: turn_id.clone() });
        if self.auto_complete {
            self.complete_turn(&turn_id, &format!("echo: {text}"));
        }
        Ok(TurnHandle { turn_id })
    }

    async fn interrupt_turn(&self, turn_id: &str) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::TurnError {
            turn_id: turn_id.to_string(),
            message: "interrupted".into(),
            will_retry: false,
        });
        *self.status.lock() = ClientStatus::Idle;
        Ok(())
    }

    async fn list_models(&self, _cursor: Option<String>, _limit: Option<u32>) -> Result<ModelPage, SupervisorError> {
        Ok(ModelPage { models: vec![format!("{}-default", self.provider)], cursor: None })
    }

    async fn set_default_model(&self, _model: String, _reasoning_effort: Option<String>) -> Result<(), SupervisorError> {
        Ok(())
    }

    async fn start_account_login(&self, _params: AccountLoginParams) -> Result<(), SupervisorError> {
        let _ = self.sink.send(ProviderEvent::AccountLoginStarted);
        Ok(())
    }

    fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
        if *self.status.lock() == ClientStatus::Idle {
            self.perform_restart();
        }
    }

    fn status(&self) -> ClientStatus {
        self.status()
    }
}

/// Builds one [`FakeProviderClient`] per worktree on first `ensure_for`
/// call, keyed by worktree id so a test can fetch the instance back out
/// to drive it manually (`complete_turn`, `request_restart`).
pub struct FakeClientFactory {
    built: Mutex<HashMap<String, Arc<FakeProviderClient>>>,
    auto_complete: bool,
}

impl FakeClientFactory {
    pub fn new(auto_complete: bool) -> Self {
        Self { built: Mutex::new(HashMap::new()), auto_complete }
    }

    pub fn get(&self, worktree_id: &str) -> Arc<FakeProviderClient> {
        self.built.lock().get(worktree_id).cloned().expect("client was not built yet")
    }
}

impl<C: vibe80_core::Clock> ClientFactory<C> for FakeClientFactory {
    fn build(&self, spec: ClientSpec<'_, C>) -> Arc<dyn ProviderClient> {
        let client = Arc::new(FakeProviderClient::new(spec.worktree.provider, spec.sink, self.auto_complete));
        self.built.lock().insert(spec.worktree.id.to_string(), client.clone());
        client
    }
}
