// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared turn-id bookkeeping and restart-if-idle flag (spec.md §4.6
//! "Lifecycle"), composed into both provider variants rather than
//! duplicated in each (§9 "polymorphism over providers").

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// `status()` values (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Starting,
    Restarting,
    Idle,
    Busy,
    Stopping,
}

/// The set of turn ids with an observed `turn_started` but no observed
/// `turn_completed`/`turn_error(!willRetry)` yet (spec.md §8 invariant),
/// plus the `requestRestart()` flag that only takes effect once the set
/// empties out.
#[derive(Default)]
pub struct TurnTracker {
    active: Mutex<HashSet<String>>,
    restart_requested: AtomicBool,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, turn_id: impl Into<String>) {
        self.active.lock().insert(turn_id.into());
    }

    /// Removes `turn_id` from the active set and returns whether the set is
    /// now empty (i.e. the child has gone idle).
    pub fn finish(&self, turn_id: &str) -> bool {
        let mut active = self.active.lock();
        active.remove(turn_id);
        active.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        !self.active.lock().is_empty()
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active.lock().iter().cloned().collect()
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    /// Clears and returns the flag — callers invoke this exactly once the
    /// active set has just become empty, per `requestRestart`'s
    /// "acted upon the next time the set becomes empty" contract.
    pub fn take_restart_if_idle(&self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.restart_requested.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reports_emptiness() {
        let tracker = TurnTracker::new();
        tracker.start("t1");
        tracker.start("t2");
        assert!(!tracker.finish("t1"));
        assert!(tracker.finish("t2"));
    }

    #[test]
    fn restart_only_takes_effect_when_idle() {
        let tracker = TurnTracker::new();
        tracker.start("t1");
        tracker.request_restart();
        assert!(!tracker.take_restart_if_idle());
        tracker.finish("t1");
        assert!(tracker.take_restart_if_idle());
        // Consumed — a second check finds nothing pending.
        assert!(!tracker.take_restart_if_idle());
    }
}
