// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vibe80_wire::ErrorCode;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access token missing")]
    TokenMissing,

    #[error("access token invalid: {0}")]
    TokenInvalid(String),

    #[error("refresh token invalid")]
    RefreshInvalid,

    #[error("refresh token reused")]
    RefreshReused,

    #[error("refresh token expired")]
    RefreshExpired,

    #[error("handoff token invalid")]
    HandoffInvalid,

    #[error("handoff token expired")]
    HandoffExpired,

    #[error("mono-auth token invalid")]
    MonoInvalid,

    #[error("mono-auth token expired")]
    MonoExpired,

    #[error("mono-auth tokens are only issued in single-tenant mode")]
    MonoNotSingleTenant,

    #[error(transparent)]
    Storage(#[from] vibe80_storage::StorageError),

    #[error(transparent)]
    InvalidId(#[from] vibe80_core::id::InvalidId),
}

impl AuthError {
    /// Maps onto the wire-facing taxonomy (spec.md §7) at the API boundary.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AuthError::TokenMissing => ErrorCode::WorkspaceTokenMissing,
            AuthError::TokenInvalid(_) => ErrorCode::WorkspaceTokenInvalid,
            AuthError::RefreshInvalid => ErrorCode::InvalidRefreshToken,
            AuthError::RefreshReused => ErrorCode::RefreshTokenReused,
            AuthError::RefreshExpired => ErrorCode::RefreshTokenExpired,
            AuthError::HandoffInvalid => ErrorCode::WorkspaceTokenInvalid,
            AuthError::HandoffExpired => ErrorCode::WorkspaceTokenInvalid,
            AuthError::MonoInvalid => ErrorCode::MonoAuthTokenInvalid,
            AuthError::MonoExpired => ErrorCode::MonoAuthTokenExpired,
            AuthError::MonoNotSingleTenant => ErrorCode::MonoAuthTokenInvalid,
            AuthError::Storage(_) => ErrorCode::InternalError,
            AuthError::InvalidId(_) => ErrorCode::WorkspaceIdInvalid,
        }
    }
}
