//! End-to-end scenarios from spec.md §8, run against in-memory/fake
//! adapters (SPEC_FULL.md §10.5) rather than real provider children.

#[path = "specs/support.rs"]
mod support;

#[path = "specs/auth_recovery.rs"]
mod auth_recovery;
#[path = "specs/codex_happy_path.rs"]
mod codex_happy_path;
#[path = "specs/parallel_worktrees.rs"]
mod parallel_worktrees;
#[path = "specs/provider_in_use.rs"]
mod provider_in_use;
#[path = "specs/refresh_reuse.rs"]
mod refresh_reuse;
#[path = "specs/restart_if_idle.rs"]
mod restart_if_idle;
