//! Wiring of executor, backend boundary and gateway for one server process.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backend::{Backend, Executor, HttpBackend, spawn_loopback_backend};
use crate::config::{BackendMode, ServerConfig};
use crate::error::ServerError;
use crate::gateway::{GatewayState, spawn_gateway};

pub struct RunningServer {
    pub gateway_addr: SocketAddr,
    /// Set when the backend runs behind the loopback HTTP listener.
    pub backend_addr: Option<SocketAddr>,
    gateway: JoinHandle<()>,
    backend: Option<JoinHandle<()>>,
}

impl RunningServer {
    /// Wait for the listeners to finish after shutdown has been signalled.
    pub async fn wait(self) {
        if let Err(err) = self.gateway.await {
            tracing::error!("gateway task failed: {err}");
        }
        if let Some(backend) = self.backend {
            if let Err(err) = backend.await {
                tracing::error!("local file server task failed: {err}");
            }
        }
    }
}

/// Start the backend (in-process or loopback) and the gateway in front of it.
pub async fn start(
    config: &ServerConfig,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<RunningServer, ServerError> {
    let executor = Arc::new(Executor::new(config.root.clone()));

    let (backend, backend_addr, backend_handle) = match config.backend {
        BackendMode::InProcess => (executor as Arc<dyn Backend>, None, None),
        BackendMode::Loopback => {
            let (addr, handle) = spawn_loopback_backend(executor, shutdown_tx.clone()).await?;
            let http = Arc::new(HttpBackend::new(addr)) as Arc<dyn Backend>;
            (http, Some(addr), Some(handle))
        }
    };

    let state = GatewayState::new(&config.token, backend);
    let (gateway_addr, gateway) = spawn_gateway(config.bind, state, shutdown_tx).await?;

    Ok(RunningServer {
        gateway_addr,
        backend_addr,
        gateway,
        backend: backend_handle,
    })
}
