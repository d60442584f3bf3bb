// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh-token rotation decision table. The CAS itself lives in the
//! adapter (it needs to mutate `MaterializedState` under lock); this module
//! is the pure decision function so it's easy to test exhaustively.

use vibe80_core::RefreshTokenRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateDecision {
    /// Presented hash is current and unexpired: accept the caller's
    /// proposed next pair as the new current, demote current to previous.
    Accept,
    /// Presented hash is the previous one and still within its grace
    /// window: some other caller already won this rotation. The adapter
    /// does not mutate state; the caller (Auth Manager) is expected to have
    /// coalesced concurrent rotations and can serve its cached pair.
    AlreadyRotated,
    /// Presented hash matches current but `current_expires_at_ms` has
    /// passed.
    Expired,
    /// Presented hash matches neither current nor a live previous: either
    /// a stale/forged token, or a genuine reuse after rotation. All
    /// refresh state for the workspace must be wiped.
    Reused,
    /// No record exists at all for this workspace.
    Unknown,
}

pub fn decide(
    record: Option<&RefreshTokenRecord>,
    presented_hash: &str,
    now_ms: u64,
) -> RotateDecision {
    let Some(record) = record else {
        return RotateDecision::Unknown;
    };

    if record.current_token_hash == presented_hash {
        return if record.current_expires_at_ms > now_ms {
            RotateDecision::Accept
        } else {
            RotateDecision::Expired
        };
    }

    if let (Some(previous_hash), Some(valid_until)) =
        (record.previous_token_hash.as_deref(), record.previous_valid_until_ms)
    {
        if previous_hash == presented_hash && valid_until > now_ms {
            return RotateDecision::AlreadyRotated;
        }
    }

    RotateDecision::Reused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RefreshTokenRecord {
        RefreshTokenRecord {
            workspace_id: vibe80_core::WorkspaceId::generate(),
            current_token_hash: "current".into(),
            current_expires_at_ms: 2_000,
            previous_token_hash: Some("previous".into()),
            previous_valid_until_ms: Some(1_500),
        }
    }

    #[test]
    fn current_unexpired_accepts() {
        assert_eq!(decide(Some(&record()), "current", 1_000), RotateDecision::Accept);
    }

    #[test]
    fn current_past_expiry_is_expired() {
        assert_eq!(decide(Some(&record()), "current", 2_500), RotateDecision::Expired);
    }

    #[test]
    fn previous_within_grace_is_already_rotated() {
        assert_eq!(decide(Some(&record()), "previous", 1_400), RotateDecision::AlreadyRotated);
    }

    #[test]
    fn previous_past_grace_is_reused() {
        assert_eq!(decide(Some(&record()), "previous", 1_600), RotateDecision::Reused);
    }

    #[test]
    fn unknown_hash_is_reused() {
        assert_eq!(decide(Some(&record()), "forged", 1_000), RotateDecision::Reused);
    }

    #[test]
    fn no_record_is_unknown() {
        assert_eq!(decide(None, "anything", 1_000), RotateDecision::Unknown);
    }
}
