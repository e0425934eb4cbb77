//! WebSocket gateway: authenticates at upgrade, then translates frames into
//! backend calls, one request in flight per connection.
//!
//! Frame and message sizes are unbounded: a whole file travels as one binary
//! message in either direction.

mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use session::{Session, SessionState};

use crate::backend::Backend;
use crate::error::ServerError;
use crate::protocol::{Frame, ResponseFrame};

pub const GATEWAY_ROUTE: &str = "/ws";

#[derive(Clone)]
pub struct GatewayState {
    token: Arc<str>,
    backend: Arc<dyn Backend>,
}

impl GatewayState {
    pub fn new(token: &str, backend: Arc<dyn Backend>) -> Self {
        Self {
            token: Arc::from(token),
            backend,
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| presented == &*self.token)
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(GATEWAY_ROUTE, get(upgrade))
        .with_state(state)
}

/// Bind the gateway listener and serve until `shutdown_tx` fires.
pub async fn spawn_gateway(
    bind: SocketAddr,
    state: GatewayState,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
    tracing::info!("gateway websocket @ ws://{addr}{GATEWAY_ROUTE}");

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let mut shutdown_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
        if let Err(err) = served {
            tracing::error!("gateway server error: {err}");
        }
    });
    Ok((addr, handle))
}

async fn upgrade(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state.authorized(&headers) {
        tracing::warn!(client = %peer, "rejected unauthenticated gateway connection");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    match ws {
        Ok(ws) => ws
            .max_message_size(usize::MAX)
            .max_frame_size(usize::MAX)
            .on_upgrade(move |socket| serve_connection(socket, peer.to_string(), state.backend)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Message loop for one authenticated connection. Ends on close or on the
/// first transport error.
pub async fn serve_connection(mut socket: WebSocket, client: String, backend: Arc<dyn Backend>) {
    tracing::info!(client = %client, "gateway connection opened");
    let mut session = Session::new();

    while let Some(message) = socket.recv().await {
        let frame = match message {
            Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
            Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(client = %client, "gateway receive failed: {err}");
                break;
            }
        };
        let Some(request) = session.on_frame(frame) else {
            continue;
        };

        let response = backend.call(&client, request).await;
        if let Err(err) = send_response(&mut socket, response).await {
            tracing::debug!(client = %client, "gateway send failed: {err}");
            break;
        }
    }

    tracing::info!(client = %client, "gateway connection closed");
}

async fn send_response(socket: &mut WebSocket, response: ResponseFrame) -> Result<(), axum::Error> {
    socket.send(Message::Text(response.header().into())).await?;
    socket.send(Message::Binary(response.body)).await
}
