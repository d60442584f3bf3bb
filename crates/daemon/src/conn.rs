// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The physical half of the Streaming Fan-out (C8): a process-wide map from
//! [`ConnId`] to the channel that actually writes bytes to a client socket.
//! [`vibe80_core::SessionRuntime`] only tracks which ids belong to which
//! session (the arena); this registry is where a `ConnId` becomes a real
//! writable half of a WebSocket, kept separate so `vibe80-core` stays free
//! of any I/O dependency (§9 "cyclic references").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use vibe80_core::ConnId;
use vibe80_wire::OutboundEnvelope;

pub struct ConnRegistry {
    next_id: AtomicU64,
    senders: parking_lot::Mutex<HashMap<ConnId, mpsc::UnboundedSender<Message>>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), senders: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnId {
        let id = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.senders.lock().insert(id, sender);
        id
    }

    pub fn remove(&self, id: ConnId) {
        self.senders.lock().remove(&id);
    }

    /// Writes `envelope` to `id`'s socket. Returns `false` (caller should
    /// evict the connection) if the socket's writer task is gone.
    pub fn send(&self, id: ConnId, envelope: &OutboundEnvelope) -> bool {
        let sender = match self.senders.lock().get(&id) {
            Some(s) => s.clone(),
            None => return false,
        };
        let text = match serde_json::to_string(envelope) {
            Ok(t) => t,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize outbound envelope");
                return true;
            }
        };
        sender.send(Message::Text(text.into())).is_ok()
    }
}

impl Default for ConnRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_to_unregistered_conn_reports_closed() {
        let registry = ConnRegistry::new();
        assert!(!registry.send(ConnId(999), &OutboundEnvelope::Pong));
    }

    #[test]
    fn send_after_remove_reports_closed() {
        let registry = ConnRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);
        registry.remove(id);
        assert!(!registry.send(id, &OutboundEnvelope::Pong));
    }
}
