//! Sandboxed file gateway: tunnels LIST, GET and PUT over a WebSocket and
//! serves them from a single root directory.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod sandbox;
pub mod server;

pub use backend::{Backend, Executor, HttpBackend};
pub use client::{ClientError, GatewayClient};
pub use config::{BackendMode, ServerConfig};
pub use gateway::{Session, SessionState};
pub use protocol::{Frame, Method, RequestFrame, ResponseFrame};
pub use sandbox::{ContainmentCheck, SandboxRoot};
pub use server::{RunningServer, start};
