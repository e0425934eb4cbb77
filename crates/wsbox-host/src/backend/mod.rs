//! Sandboxed file backend and the boundary the gateway calls it through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{RequestFrame, ResponseFrame};

mod executor;
pub mod http;

pub use executor::{AUDIT_TARGET, Executor};
pub use http::{CLIENT_HEADER, HttpBackend, spawn_loopback_backend};

/// One synchronous request/response call per tunneled request.
///
/// Implementations never fail: every outcome is a status and a body.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn call(&self, client: &str, request: RequestFrame) -> ResponseFrame;
}

#[async_trait]
impl Backend for Executor {
    async fn call(&self, client: &str, request: RequestFrame) -> ResponseFrame {
        self.execute(client, request).await
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn call(&self, client: &str, request: RequestFrame) -> ResponseFrame {
        (**self).call(client, request).await
    }
}
