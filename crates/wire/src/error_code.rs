// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire-facing error taxonomy (spec.md §7). Internal errors from every
//! other crate map onto one of these at the API boundary (C10) — they are
//! never serialized to a client directly.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    WorkspaceTokenMissing,
    WorkspaceTokenInvalid,
    WorkspaceCredentialsInvalid,
    WorkspaceIdInvalid,
    ProviderNotEnabled,
    ProviderInvalid,
    ProviderInUse,
    SessionNotFound,
    SessionInvalid,
    WorktreeNotFound,
    BranchRequired,
    RepoUrlRequired,
    #[serde(rename = "refresh_token_expired")]
    RefreshTokenExpired,
    #[serde(rename = "refresh_token_reused")]
    RefreshTokenReused,
    #[serde(rename = "invalid_refresh_token")]
    InvalidRefreshToken,
    MonoAuthTokenInvalid,
    MonoAuthTokenUsed,
    MonoAuthTokenExpired,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("INTERNAL_ERROR"))
    }
}

/// A generic `HTTP_<status>` error code for the boundary layer (out of scope
/// here but referenced by spec.md §7's taxonomy).
pub fn http_error_code(status: u16) -> String {
    format!("HTTP_{status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_reused_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorCode::RefreshTokenReused).unwrap();
        assert_eq!(json, "\"refresh_token_reused\"");
    }

    #[test]
    fn provider_not_enabled_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ProviderNotEnabled).unwrap();
        assert_eq!(json, "\"PROVIDER_NOT_ENABLED\"");
    }
}
