// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HS256 access tokens (spec.md §4.3): `sub=workspaceId`, fixed `iss`/`aud`,
//! default TTL 1h, unique `jti`.
//!
//! Expiry is checked against the caller-supplied `now_ms` rather than
//! `jsonwebtoken`'s own wall-clock check, so the whole crate stays
//! consistent with one injectable [`vibe80_core::Clock`] — a
//! [`vibe80_core::FakeClock`] whose epoch is set far from real time would
//! otherwise make every freshly minted token look expired or not-yet-valid.

use crate::error::AuthError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vibe80_core::WorkspaceId;

pub const ISSUER: &str = "vibe80";
pub const AUDIENCE: &str = "vibe80-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

pub fn mint_access_token(
    key: &[u8],
    workspace_id: &WorkspaceId,
    now_ms: u64,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now_s = now_ms / 1000;
    let claims = AccessClaims {
        sub: workspace_id.to_string(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat: now_s,
        exp: now_s + ttl.as_secs(),
        jti: random_hex(16),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key))
        .map_err(|err| AuthError::TokenInvalid(err.to_string()))
}

pub fn verify_access_token(key: &[u8], token: &str, now_ms: u64) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(key), &validation)
        .map_err(|err| AuthError::TokenInvalid(err.to_string()))?;

    let now_s = now_ms / 1000;
    if data.claims.exp <= now_s {
        return Err(AuthError::TokenInvalid("token expired".to_string()));
    }
    Ok(data.claims)
}

pub(crate) fn random_hex(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW_MS: u64 = 1_700_000_000_000;

    #[test]
    fn round_trips_claims() {
        let key = b"test-key";
        let workspace_id = WorkspaceId::generate();
        let token = mint_access_token(key, &workspace_id, NOW_MS, Duration::from_secs(3600)).unwrap();
        let claims = verify_access_token(key, &token, NOW_MS).unwrap();
        assert_eq!(claims.sub, workspace_id.to_string());
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn rejects_tampered_signature() {
        let workspace_id = WorkspaceId::generate();
        let token = mint_access_token(b"key-a", &workspace_id, NOW_MS, Duration::from_secs(3600)).unwrap();
        assert!(verify_access_token(b"key-b", &token, NOW_MS).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let key = b"test-key";
        let workspace_id = WorkspaceId::generate();
        let token = mint_access_token(key, &workspace_id, NOW_MS, Duration::from_secs(60)).unwrap();
        let past_expiry = NOW_MS + Duration::from_secs(3600).as_millis() as u64;
        assert!(verify_access_token(key, &token, past_expiry).is_err());
    }
}
