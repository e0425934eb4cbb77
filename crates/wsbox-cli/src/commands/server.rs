//! `wsbox server` command.

use anyhow::{Context, Result};
use tokio::signal::unix::Signal;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use wsbox_host::{BackendMode, ContainmentCheck, ServerConfig};

use crate::opts::ServerArgs;

pub async fn cmd_server(args: &ServerArgs) -> Result<()> {
    setup_logging();

    let backend = if args.loopback_backend {
        BackendMode::Loopback
    } else {
        BackendMode::InProcess
    };
    let containment = if args.strict_containment {
        ContainmentCheck::PathComponents
    } else {
        ContainmentCheck::LiteralPrefix
    };
    let config = ServerConfig::new(args.addr, &args.dir, args.token.clone())
        .context("invalid server configuration")?
        .with_backend(backend)
        .with_containment(containment);

    println!("=== wsbox ===");
    println!("sandbox: {}", config.root.path().display());
    println!("fixed token: {}", config.token);

    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl-C and SIGTERM for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        let term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        if let Err(err) = &term {
            tracing::warn!("SIGTERM handler unavailable: {err}");
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = sigterm(term.ok()) => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx_clone.send(());
    });

    let server = wsbox_host::start(&config, shutdown_tx)
        .await
        .context("start gateway")?;
    tracing::info!(
        "connect with: wsbox client -s ws://TOKEN@{}/ws list",
        server.gateway_addr
    );
    server.wait().await;
    Ok(())
}

/// Resolves on SIGTERM. Without a handler it never resolves, leaving Ctrl-C as
/// the only shutdown trigger.
async fn sigterm(term: Option<Signal>) {
    match term {
        Some(mut term) => {
            term.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Set up tracing subscriber for server logging (`RUST_LOG`, default `info`).
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
