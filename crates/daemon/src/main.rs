// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vibe80d entry point: load config, wire up storage/auth/exec, accept
//! streaming connections, sweep GC, drain gracefully on SIGTERM/SIGINT.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use vibe80_auth::AuthManager;
use vibe80_core::{Config, SystemClock};
use vibe80_exec::{AuditSink, FileAuditSink};
use vibe80_storage::{FileStorageAdapter, MemoryStorageAdapter, StorageAdapter};
use vibe80d::Context;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Arc::new(Config::from_env()?);
    let storage = build_storage(&config)?;
    let clock = SystemClock;
    let auth = Arc::new(AuthManager::new(&config, storage.clone(), clock.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(config.workspace_home_base.clone()));
    let context = Arc::new(Context::new(config.clone(), storage, auth, audit, clock));

    let shutdown = CancellationToken::new();
    vibe80d::gc::spawn_all(context.clone(), shutdown.clone());

    let port: u16 = std::env::var("VIBE80_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8089);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "vibe80d listening");

    let fanout_shutdown = shutdown.clone();
    let fanout_context = context.clone();
    let fanout_task = tokio::spawn(async move {
        vibe80d::fanout::run(listener, fanout_context, fanout_shutdown).await;
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections");
    shutdown.cancel();
    let _ = fanout_task.await;
    Ok(())
}

fn build_storage(config: &Config) -> Result<Arc<dyn StorageAdapter>, Box<dyn std::error::Error>> {
    match std::env::var("VIBE80_STORAGE_BACKEND").as_deref() {
        Ok("memory") => Ok(Arc::new(MemoryStorageAdapter::new())),
        _ => {
            let wal_path = config.workspace_home_base.join("vibe80d.wal");
            let archive_dir = config.workspace_home_base.join("archive");
            Ok(Arc::new(FileStorageAdapter::open(wal_path, archive_dir)?))
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
