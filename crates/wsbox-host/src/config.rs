use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::sandbox::{ContainmentCheck, SandboxRoot};

/// Default gateway listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Bytes of randomness in a generated access token.
const TOKEN_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sandbox directory '{}': {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sandbox path '{}' is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("generate token: {0}")]
    Token(String),
}

/// How the gateway reaches the file backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendMode {
    /// Direct call into the executor.
    #[default]
    InProcess,
    /// HTTP round-trip to a listener bound on `127.0.0.1`.
    Loopback,
}

/// Everything the gateway and executor need, built once at start-up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub root: SandboxRoot,
    pub token: String,
    pub backend: BackendMode,
}

impl ServerConfig {
    /// Validate `dir` as the sandbox root. An empty or missing token is
    /// replaced with a random one.
    pub fn new(bind: SocketAddr, dir: &Path, token: Option<String>) -> Result<Self, ConfigError> {
        let root_err = |source| ConfigError::Root {
            path: dir.to_path_buf(),
            source,
        };
        let metadata = std::fs::metadata(dir).map_err(root_err)?;
        if !metadata.is_dir() {
            return Err(ConfigError::RootNotDirectory(dir.to_path_buf()));
        }
        let root = SandboxRoot::new(dir).map_err(root_err)?;

        let token = match token.filter(|token| !token.is_empty()) {
            Some(token) => token,
            None => generate_token()?,
        };

        Ok(Self {
            bind,
            root,
            token,
            backend: BackendMode::default(),
        })
    }

    pub fn with_backend(mut self, backend: BackendMode) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_containment(mut self, check: ContainmentCheck) -> Self {
        self.root = self.root.with_check(check);
        self
    }
}

/// Hex-encoded random access token.
pub fn generate_token() -> Result<String, ConfigError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|err| ConfigError::Token(err.to_string()))?;
    Ok(hex::encode(bytes))
}
