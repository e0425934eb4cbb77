//! Client side of the gateway protocol. Every operation dials a fresh
//! connection, performs exactly one exchange and closes it.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use url::Url;

use crate::protocol::{Frame, ProtocolError, RequestFrame, ResponseFrame, parse_response_header};

pub const DEFAULT_SERVER: &str = "ws://127.0.0.1:8080/ws";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("dial {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("server rejected the access token")]
    Unauthorized,
    #[error("websocket: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("connection closed before the response was complete")]
    Closed,
    #[error("expected a {expected} frame, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("body is {actual} bytes but header announced {declared}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("decode listing: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("'{}' is a directory; directory upload is not supported", .0.display())]
    DirectoryUpload(PathBuf),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ClientError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Issues LIST, PUT and GET against a gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    url: Url,
    token: Option<String>,
}

impl GatewayClient {
    /// `server` is a `ws://` or `wss://` URL. A token embedded as the URL's
    /// user (`ws://TOKEN@host/ws`) is lifted out of the URL; an explicit
    /// `token` takes precedence over it.
    pub fn new(server: &str, token: Option<String>) -> Result<Self, ClientError> {
        let invalid = |message: String| ClientError::InvalidUrl {
            url: server.to_string(),
            message,
        };
        let mut url = Url::parse(server).map_err(|err| invalid(err.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }

        let embedded = match url.username() {
            "" => None,
            user => Some(percent_decode_str(user).decode_utf8_lossy().into_owned()),
        };
        url.set_username("")
            .and_then(|_| url.set_password(None))
            .map_err(|_| invalid("cannot strip credentials".into()))?;

        Ok(Self {
            url,
            token: token.filter(|token| !token.is_empty()).or(embedded),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Names in `dir`; directories carry a trailing `/`.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>, ClientError> {
        let dir = if dir.is_empty() { "/" } else { dir };
        let response = self.exchange(RequestFrame::list(dir)).await?;
        let response = expect_success(response)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Upload `local` to `remote`. Returns the server's receipt text.
    pub async fn add(&self, local: &Path, remote: &str) -> Result<String, ClientError> {
        let metadata = tokio::fs::metadata(local)
            .await
            .map_err(|err| ClientError::io(format!("open '{}'", local.display()), err))?;
        if metadata.is_dir() {
            return Err(ClientError::DirectoryUpload(local.to_path_buf()));
        }
        let content = tokio::fs::read(local)
            .await
            .map_err(|err| ClientError::io(format!("read '{}'", local.display()), err))?;

        let request = RequestFrame::put(remote_path(remote), content);
        let response = expect_success(self.exchange(request).await?)?;
        Ok(response.body_text())
    }

    /// Download `remote` into `local`. Returns the number of bytes written.
    pub async fn get(&self, remote: &str, local: &Path) -> Result<u64, ClientError> {
        let response = self.exchange(RequestFrame::get(remote_path(remote))).await?;
        let response = expect_success(response)?;
        tokio::fs::write(local, &response.body)
            .await
            .map_err(|err| ClientError::io(format!("write '{}'", local.display()), err))?;
        Ok(response.body.len() as u64)
    }

    /// Send one request and read its paired response on a fresh connection.
    pub async fn exchange(&self, request: RequestFrame) -> Result<ResponseFrame, ClientError> {
        let mut socket = self.dial().await?;
        socket.send(Message::text(request.request_line())).await?;
        if request.method.needs_payload() {
            let payload = request.payload.unwrap_or_default();
            socket.send(Message::binary(payload)).await?;
        }
        let response = read_response(&mut socket).await?;
        let _ = socket.close(None).await;
        Ok(response)
    }

    async fn dial(&self) -> Result<Socket, ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                ClientError::InvalidUrl {
                    url: self.url.to_string(),
                    message: format!("token is not a valid header value: {err}"),
                }
            })?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        match connect_async_with_config(request, Some(socket_config()), false).await {
            Ok((socket, _)) => Ok(socket),
            Err(tungstenite::Error::Http(response))
                if response.status() == StatusCode::UNAUTHORIZED =>
            {
                Err(ClientError::Unauthorized)
            }
            Err(source) => Err(ClientError::Connect {
                url: self.url.to_string(),
                source,
            }),
        }
    }
}

/// Read a `"<status> <length>"` header and the binary body that follows it.
/// The body is consumed even for error statuses so the connection is left
/// with nothing unread.
async fn read_response(socket: &mut Socket) -> Result<ResponseFrame, ClientError> {
    let header_text = match next_frame(socket).await? {
        Frame::Text(text) => text,
        other => {
            return Err(ClientError::UnexpectedFrame {
                expected: "text",
                got: other.kind(),
            });
        }
    };
    let header = parse_response_header(&header_text)?;

    let body = match next_frame(socket).await? {
        Frame::Binary(body) => body,
        other => {
            return Err(ClientError::UnexpectedFrame {
                expected: "binary",
                got: other.kind(),
            });
        }
    };
    if body.len() != header.length {
        return Err(ClientError::LengthMismatch {
            declared: header.length,
            actual: body.len(),
        });
    }
    Ok(ResponseFrame::new(header.status, body))
}

async fn next_frame(socket: &mut Socket) -> Result<Frame, ClientError> {
    loop {
        let Some(message) = socket.next().await else {
            return Err(ClientError::Closed);
        };
        match message? {
            Message::Text(text) => return Ok(Frame::Text(text.as_str().to_owned())),
            Message::Binary(body) => return Ok(Frame::Binary(Bytes::from(body))),
            Message::Close(_) => return Err(ClientError::Closed),
            _ => {}
        }
    }
}

/// No frame or message size cap, matching the gateway: a whole file is one
/// binary message.
fn socket_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = None;
    config.max_frame_size = None;
    config
}

fn expect_success(response: ResponseFrame) -> Result<ResponseFrame, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Remote {
            status: response.status,
            message: response.body_text(),
        })
    }
}

fn remote_path(remote: &str) -> String {
    if remote.starts_with('/') {
        remote.to_string()
    } else {
        format!("/{remote}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_lifted_out_of_the_url() {
        let client = GatewayClient::new("ws://mysecret@server:8080/ws", None).unwrap();
        assert_eq!(client.token(), Some("mysecret"));
        assert_eq!(client.url().as_str(), "ws://server:8080/ws");
    }

    #[test]
    fn explicit_token_wins_over_embedded_one() {
        let client =
            GatewayClient::new("ws://embedded@server:8080/ws", Some("explicit".into())).unwrap();
        assert_eq!(client.token(), Some("explicit"));

        let client = GatewayClient::new(DEFAULT_SERVER, Some(String::new())).unwrap();
        assert_eq!(client.token(), None);
    }

    #[test]
    fn rejects_non_websocket_urls() {
        for url in ["http://server/ws", "not a url"] {
            assert!(
                matches!(GatewayClient::new(url, None), Err(ClientError::InvalidUrl { .. })),
                "{url}"
            );
        }
    }

    #[test]
    fn remote_paths_are_rooted() {
        assert_eq!(remote_path("a/b.txt"), "/a/b.txt");
        assert_eq!(remote_path("/a/b.txt"), "/a/b.txt");
    }

    #[test]
    fn non_2xx_responses_become_remote_errors() {
        let err = expect_success(ResponseFrame::message(404, "not found: /x")).unwrap_err();
        match err {
            ClientError::Remote { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "not found: /x");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(expect_success(ResponseFrame::message(201, "{}")).is_ok());
    }
}
