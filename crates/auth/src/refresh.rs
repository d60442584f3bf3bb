// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh-token minting, hashing, and the rotation outcome table
//! (spec.md §4.3) wired to [`vibe80_storage::StorageAdapter`].

use sha2::{Digest, Sha256};

use crate::access::random_hex;

/// Random 32-byte hex refresh-token secret. Never persisted in plaintext —
/// only [`hash_refresh_token`]'s output is.
pub fn generate_refresh_token() -> String {
    random_hex(32)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
