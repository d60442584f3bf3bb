// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC id correlation for the long-lived Codex child: a "promise map"
//! keyed by request id, resolved by the reader task when a matching
//! response line arrives.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use vibe80_wire::JsonRpcError;

type Pending = oneshot::Sender<Result<serde_json::Value, JsonRpcError>>;

#[derive(Default)]
pub struct PromiseMap {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

impl PromiseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next request id and registers a waiter for it.
    pub fn register(&self) -> (u64, oneshot::Receiver<Result<serde_json::Value, JsonRpcError>>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        (id, rx)
    }

    /// Resolves the waiter for `id`, if one is still registered (it may
    /// have already timed out and been dropped).
    pub fn resolve(&self, id: u64, result: Result<serde_json::Value, JsonRpcError>) {
        if let Some(tx) = self.pending.lock().remove(&id) {
            let _ = tx.send(result);
        }
    }

    /// Fails every outstanding waiter — called when the child exits or the
    /// reader task observes EOF.
    pub fn fail_all(&self, message: &str) {
        let mut pending = self.pending.lock();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(JsonRpcError { code: -32000, message: message.to_string(), data: None }));
        }
    }
}
