//! Server and client options. Every flag can also be set via env vars.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use wsbox_host::GatewayClient;
use wsbox_host::client::DEFAULT_SERVER;
use wsbox_host::config::DEFAULT_BIND;

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Gateway listen address (env: WSBOX_ADDR)
    #[arg(long, env = "WSBOX_ADDR", default_value = DEFAULT_BIND)]
    pub addr: SocketAddr,

    /// Sandbox root directory (env: WSBOX_DIR)
    #[arg(long, env = "WSBOX_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Access token; generated when empty (env: WSBOX_TOKEN)
    #[arg(long, env = "WSBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Reach the file backend through a loopback HTTP listener
    #[arg(long = "loopback-backend")]
    pub loopback_backend: bool,

    /// Compare path components instead of raw string prefixes when
    /// checking containment
    #[arg(long = "strict-containment")]
    pub strict_containment: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClientOpts {
    /// Gateway URL; a token may be embedded as ws://TOKEN@host/ws (env: WSBOX_SERVER)
    #[arg(short = 's', long, env = "WSBOX_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Access token, overrides one embedded in the URL (env: WSBOX_TOKEN)
    #[arg(long, env = "WSBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ClientOpts {
    pub fn connect(&self) -> Result<GatewayClient> {
        GatewayClient::new(&self.server, self.token.clone())
            .with_context(|| format!("invalid server '{}'", self.server))
    }
}
