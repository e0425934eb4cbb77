//! HTTP-shaped boundary between the gateway and the executor.
//!
//! The loopback listener serves the executor on `127.0.0.1` only:
//! `GET /_list?dir=<dir>` lists, `GET /<path>` downloads, `POST|PUT /<path>`
//! uploads, anything else is 405. [`HttpBackend`] is the gateway's side of
//! that boundary.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method as HttpMethod, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{Backend, Executor};
use crate::error::ServerError;
use crate::protocol::{
    LIST_ROUTE, Method, RequestFrame, ResponseFrame, escape_path, parse_request_line,
};

/// Header carrying the gateway peer's identity to the loopback backend.
pub const CLIENT_HEADER: &str = "x-wsbox-client";

pub fn router(executor: Arc<Executor>) -> Router {
    Router::new().fallback(dispatch).with_state(executor)
}

/// Bind the loopback listener on an ephemeral port and serve until `shutdown_tx`
/// fires.
pub async fn spawn_loopback_backend(
    executor: Arc<Executor>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let bind = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
    tracing::info!("local file server @ http://{addr}");

    let app = router(executor).into_make_service_with_connect_info::<SocketAddr>();
    let mut shutdown_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
        if let Err(err) = served {
            tracing::error!("local file server error: {err}");
        }
    });
    Ok((addr, handle))
}

async fn dispatch(State(executor): State<Arc<Executor>>, request: Request) -> Response {
    let client = request
        .headers()
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let method = request.method().clone();
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let token = match method {
        HttpMethod::GET => "GET",
        HttpMethod::POST | HttpMethod::PUT => "PUT",
        _ => {
            return ResponseFrame::message(405, "method not allowed").into_response();
        }
    };
    // Reuse the request-line decoder so both boundaries agree on path and
    // listing semantics.
    let mut frame = match parse_request_line(&format!("{token} {target}")) {
        Ok(frame) => frame,
        Err(err) => return ResponseFrame::message(400, err.to_string()).into_response(),
    };
    if frame.method == Method::Put {
        match axum::body::to_bytes(request.into_body(), usize::MAX).await {
            Ok(body) => frame.payload = Some(body),
            Err(err) => {
                return ResponseFrame::message(400, format!("read body: {err}")).into_response();
            }
        }
    }

    executor.execute(&client, frame).await.into_response()
}

impl IntoResponse for ResponseFrame {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.body).into_response()
    }
}

/// Forwards requests to a loopback listener started by
/// [`spawn_loopback_backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
        }
    }

    async fn forward(
        &self,
        client: &str,
        request: RequestFrame,
    ) -> Result<ResponseFrame, reqwest::Error> {
        let path = if request.path.starts_with('/') {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };
        let url = format!("{}{}", self.base, escape_path(&path));

        let builder = match &request.method {
            Method::List => self
                .http
                .get(format!("{}{LIST_ROUTE}", self.base))
                .query(&[("dir", request.path.as_str())]),
            Method::Get => self.http.get(url),
            Method::Put => self
                .http
                .post(url)
                .body(request.payload.clone().unwrap_or_default()),
            Method::Other(token) => match reqwest::Method::from_bytes(token.as_bytes()) {
                Ok(method) => self.http.request(method, url),
                Err(_) => return Ok(ResponseFrame::message(405, "method not allowed")),
            },
        };
        let builder = match (&request.method, request.inline_body) {
            (Method::Put, _) | (_, None) => builder,
            (_, Some(inline)) => builder.body(inline),
        };

        let response = builder.header(CLIENT_HEADER, client).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(ResponseFrame::new(status, body))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(&self, client: &str, request: RequestFrame) -> ResponseFrame {
        match self.forward(client, request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(client, "backend call failed: {err}");
                ResponseFrame::message(StatusCode::BAD_GATEWAY.as_u16(), err.to_string())
            }
        }
    }
}
