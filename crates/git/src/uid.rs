// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host uid allocation for the Workspace Provisioner (spec.md §4.4).
//!
//! Runs before any per-workspace sandbox exists, so these checks always use
//! an `Executor` in [`vibe80_exec::ExecutorMode::Bypass`].

use rand::Rng;
use vibe80_core::Clock;
use vibe80_exec::{ExecOpts, Executor};

use crate::error::GitError;

const MAX_ATTEMPTS: u32 = 64;

/// Picks a random uid in `[min, max)` not already present in `getent passwd`,
/// retrying on collision. `min`/`max` come from `Config::workspace_uid_min/max`.
pub async fn allocate_uid<C: Clock>(executor: &Executor<C>, min: u32, max: u32) -> Result<u32, GitError> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = rand::thread_rng().gen_range(min..max);
        if !uid_taken(executor, candidate).await? {
            return Ok(candidate);
        }
    }
    Err(GitError::UidExhausted { attempts: MAX_ATTEMPTS })
}

async fn uid_taken<C: Clock>(executor: &Executor<C>, uid: u32) -> Result<bool, GitError> {
    let argv = vec!["getent".to_string(), "passwd".to_string(), uid.to_string()];
    let out = executor.run("host", &argv, &ExecOpts::default()).await?;
    // `getent` exits 0 with a matching line if the uid is taken, 2 if not found.
    Ok(out.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::SystemClock;

    #[tokio::test]
    async fn root_uid_is_reported_taken() {
        let executor = Executor::bypass(SystemClock);
        assert!(uid_taken(&executor, 0).await.unwrap());
    }

    #[tokio::test]
    async fn allocates_within_a_high_unused_range() {
        let executor = Executor::bypass(SystemClock);
        let uid = allocate_uid(&executor, 100_000, 200_000).await.unwrap();
        assert!((100_000..200_000).contains(&uid));
    }
}
