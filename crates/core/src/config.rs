// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized, immutable process configuration.
//!
//! Built once at boot from the environment toggles enumerated in spec.md
//! §6 and threaded through every component constructor as an `Arc<Config>`
//! — no ambient `std::env::var` calls after `Config::from_env` returns
//! (§9 "global mutable state").

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    MonoUser,
    MultiUser,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid DEPLOYMENT_MODE: {0:?} (expected mono_user or multi_user)")]
    InvalidDeploymentMode(String),

    #[error("WORKSPACE_UID_MIN ({min}) must be less than WORKSPACE_UID_MAX ({max})")]
    InvalidUidRange { min: u32, max: u32 },

    #[error("could not determine a home directory for WORKSPACE_HOME_BASE")]
    NoHomeBase,

    #[error("JWT_KEY_PATH is not readable and JWT_KEY is unset: {0}")]
    NoJwtKey(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub deployment_mode: DeploymentMode,
    pub workspace_uid_min: u32,
    pub workspace_uid_max: u32,
    pub workspace_home_base: PathBuf,
    pub jwt_key: Vec<u8>,
    pub session_idle_ttl: Duration,
    pub session_max_ttl: Duration,
    pub session_gc_interval: Duration,
    pub refresh_token_ttl: Duration,
    pub refresh_token_rotation_grace: Duration,
    pub handoff_token_ttl: Duration,
    pub mono_auth_token_ttl: Duration,
    pub activate_provider_log: bool,
    pub provider_log_directory: PathBuf,
    pub allow_run_slash_command: bool,
    pub allow_git_slash_command: bool,
    pub terminal_enabled: bool,
    pub system_prompt: Option<String>,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_var(key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") => true,
        Some("0") | Some("false") | Some("FALSE") => false,
        _ => default,
    }
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    env_var(key).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_millis).unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env_var(key).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let deployment_mode = match env_var("DEPLOYMENT_MODE").as_deref() {
            None | Some("multi_user") => DeploymentMode::MultiUser,
            Some("mono_user") => DeploymentMode::MonoUser,
            Some(other) => return Err(ConfigError::InvalidDeploymentMode(other.to_string())),
        };

        let workspace_uid_min = env_u32("WORKSPACE_UID_MIN", 100_000);
        let workspace_uid_max = env_u32("WORKSPACE_UID_MAX", 200_000);
        if workspace_uid_min >= workspace_uid_max {
            return Err(ConfigError::InvalidUidRange {
                min: workspace_uid_min,
                max: workspace_uid_max,
            });
        }

        let workspace_home_base = match env_var("WORKSPACE_HOME_BASE") {
            Some(v) => PathBuf::from(v),
            None => PathBuf::from("/home"),
        };

        let jwt_key = resolve_jwt_key()?;

        Ok(Self {
            deployment_mode,
            workspace_uid_min,
            workspace_uid_max,
            workspace_home_base,
            jwt_key,
            session_idle_ttl: env_duration_ms("SESSION_IDLE_TTL_MS", Duration::from_secs(24 * 3600)),
            session_max_ttl: env_duration_ms("SESSION_MAX_TTL_MS", Duration::from_secs(7 * 24 * 3600)),
            session_gc_interval: env_duration_ms("SESSION_GC_INTERVAL_MS", Duration::from_secs(300)),
            refresh_token_ttl: env_duration_secs("REFRESH_TOKEN_TTL_SECONDS", Duration::from_secs(30 * 24 * 3600)),
            refresh_token_rotation_grace: env_duration_secs(
                "REFRESH_TOKEN_ROTATION_GRACE_SECONDS",
                Duration::from_secs(20),
            ),
            handoff_token_ttl: env_duration_ms("HANDOFF_TOKEN_TTL_MS", Duration::from_secs(120)),
            mono_auth_token_ttl: env_duration_ms("MONO_AUTH_TOKEN_TTL_MS", Duration::from_secs(300)),
            activate_provider_log: env_bool("ACTIVATE_PROVIDER_LOG", false),
            provider_log_directory: env_var("PROVIDER_LOG_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/log/vibe80/providers")),
            allow_run_slash_command: env_bool("ALLOW_RUN_SLASH_COMMAND", false),
            allow_git_slash_command: env_bool("ALLOW_GIT_SLASH_COMMAND", false),
            terminal_enabled: env_bool("TERMINAL_ENABLED", false),
            system_prompt: env_var("SYSTEM_PROMPT"),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }
}

/// Resolve the HS256 signing key: `JWT_KEY` env var directly, else
/// `JWT_KEY_PATH` (a root-owned 0600 file), else generate and persist one at
/// `JWT_KEY_PATH` (default `/etc/vibe80/jwt.key`) at first boot (§4.3, §10.6).
fn resolve_jwt_key() -> Result<Vec<u8>, ConfigError> {
    if let Some(key) = env_var("JWT_KEY") {
        return Ok(key.into_bytes());
    }

    let path = env_var("JWT_KEY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/vibe80/jwt.key"));

    if let Ok(bytes) = std::fs::read(&path) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }

    let generated = generate_key_material();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    write_key_file(&path, &generated).map_err(|e| ConfigError::NoJwtKey(e.to_string()))?;
    Ok(generated)
}

fn generate_key_material() -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes).into_bytes()
}

#[cfg(unix)]
fn write_key_file(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_key_file(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn invalid_deployment_mode_is_rejected() {
        std::env::set_var("DEPLOYMENT_MODE", "bogus");
        std::env::set_var("JWT_KEY", "test-key");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeploymentMode(_)));
        std::env::remove_var("DEPLOYMENT_MODE");
        std::env::remove_var("JWT_KEY");
    }

    #[test]
    #[serial(env)]
    fn uid_range_must_be_ordered() {
        std::env::set_var("WORKSPACE_UID_MIN", "500");
        std::env::set_var("WORKSPACE_UID_MAX", "100");
        std::env::set_var("JWT_KEY", "test-key");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUidRange { .. }));
        std::env::remove_var("WORKSPACE_UID_MIN");
        std::env::remove_var("WORKSPACE_UID_MAX");
        std::env::remove_var("JWT_KEY");
    }

    #[test]
    #[serial(env)]
    fn jwt_key_env_var_is_used_directly() {
        std::env::set_var("JWT_KEY", "super-secret");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.jwt_key, b"super-secret");
        std::env::remove_var("JWT_KEY");
    }
}
