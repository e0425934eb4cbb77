use std::net::SocketAddr;
use std::path::Path;

use futures_util::{SinkExt, Stream, StreamExt};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use wsbox_host::client::ClientError;
use wsbox_host::{BackendMode, GatewayClient, RunningServer, ServerConfig};

const TOKEN: &str = "mysecret";

struct Harness {
    root: TempDir,
    server: RunningServer,
    shutdown_tx: broadcast::Sender<()>,
}

impl Harness {
    async fn start(mode: BackendMode) -> Self {
        let root = TempDir::new().unwrap();
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ServerConfig::new(bind, root.path(), Some(TOKEN.into()))
            .unwrap()
            .with_backend(mode);
        let (shutdown_tx, _) = broadcast::channel(1);
        let server = wsbox_host::start(&config, shutdown_tx.clone()).await.unwrap();
        Self {
            root,
            server,
            shutdown_tx,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.server.gateway_addr)
    }

    fn client(&self) -> GatewayClient {
        GatewayClient::new(&self.url(), Some(TOKEN.into())).unwrap()
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.server.wait().await;
    }
}

async fn round_trip_scenario(mode: BackendMode) {
    let harness = Harness::start(mode).await;
    let client = harness.client();
    let scratch = TempDir::new().unwrap();

    let local = scratch.path().join("file.bin");
    std::fs::write(&local, [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    let receipt = client.add(&local, "/sub/deep/file.bin").await.unwrap();
    assert!(receipt.contains("\"written_bytes\":4"), "{receipt}");
    assert!(harness.root().join("sub/deep").is_dir());

    let downloaded = scratch.path().join("downloaded.bin");
    let written = client.get("/sub/deep/file.bin", &downloaded).await.unwrap();
    assert_eq!(written, 4);
    assert_eq!(std::fs::read(&downloaded).unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);

    let empty = scratch.path().join("empty");
    std::fs::write(&empty, b"").unwrap();
    client.add(&empty, "empty.txt").await.unwrap();
    let empty_copy = scratch.path().join("empty.copy");
    assert_eq!(client.get("empty.txt", &empty_copy).await.unwrap(), 0);
    assert!(std::fs::read(&empty_copy).unwrap().is_empty());

    let names = client.list("/").await.unwrap();
    assert_eq!(names, vec!["empty.txt".to_string(), "sub/".to_string()]);

    harness.stop().await;
}

#[tokio::test]
async fn upload_download_and_list_in_process() {
    round_trip_scenario(BackendMode::InProcess).await;
}

#[tokio::test]
async fn upload_download_and_list_through_loopback_backend() {
    round_trip_scenario(BackendMode::Loopback).await;
}

#[tokio::test]
async fn payloads_over_sixteen_mib_round_trip() {
    let payload: Vec<u8> = (0..17 * 1024 * 1024 + 3).map(|i| (i % 251) as u8).collect();
    for mode in [BackendMode::InProcess, BackendMode::Loopback] {
        let harness = Harness::start(mode).await;
        let client = harness.client();
        let scratch = TempDir::new().unwrap();

        let local = scratch.path().join("big.bin");
        std::fs::write(&local, &payload).unwrap();
        let receipt = client.add(&local, "/big.bin").await.unwrap();
        assert!(
            receipt.contains(&format!("\"written_bytes\":{}", payload.len())),
            "{mode:?}: {receipt}"
        );

        let downloaded = scratch.path().join("big.copy");
        let written = client.get("/big.bin", &downloaded).await.unwrap();
        assert_eq!(written, payload.len() as u64, "{mode:?}");
        assert!(std::fs::read(&downloaded).unwrap() == payload, "{mode:?}");

        harness.stop().await;
    }
}

#[tokio::test]
async fn traversal_is_reported_as_bad_request() {
    for mode in [BackendMode::InProcess, BackendMode::Loopback] {
        let harness = Harness::start(mode).await;
        let err = harness.client().list("/../../etc").await.unwrap_err();
        match err {
            ClientError::Remote { status, .. } => assert_eq!(status, 400, "{mode:?}"),
            other => panic!("unexpected error {other:?}"),
        }
        harness.stop().await;
    }
}

#[tokio::test]
async fn missing_file_is_a_remote_not_found() {
    let harness = Harness::start(BackendMode::InProcess).await;
    let scratch = TempDir::new().unwrap();
    let target = scratch.path().join("never");

    let err = harness.client().get("/missing.txt", &target).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: 404, .. }), "{err:?}");
    assert!(!target.exists());
    harness.stop().await;
}

#[tokio::test]
async fn wrong_or_missing_token_is_rejected_at_upgrade() {
    let harness = Harness::start(BackendMode::InProcess).await;

    let wrong = GatewayClient::new(&harness.url(), Some("wrong".into())).unwrap();
    assert!(matches!(wrong.list("/").await, Err(ClientError::Unauthorized)));

    let anonymous = GatewayClient::new(&harness.url(), None).unwrap();
    assert!(matches!(anonymous.list("/").await, Err(ClientError::Unauthorized)));

    let url = format!("ws://{TOKEN}@{}/ws", harness.server.gateway_addr);
    let embedded = GatewayClient::new(&url, None).unwrap();
    assert!(embedded.list("/").await.unwrap().is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn one_connection_serves_sequential_requests_and_ignores_stray_frames() {
    let harness = Harness::start(BackendMode::InProcess).await;
    std::fs::write(harness.root().join("a.txt"), b"alpha").unwrap();

    let mut request = harness.url().into_client_request().unwrap();
    request.headers_mut().insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {TOKEN}")).unwrap(),
    );
    let (mut socket, _) = connect_async(request).await.unwrap();

    // Stray binary frame and malformed line: no response for either.
    socket.send(Message::binary(b"stray".to_vec())).await.unwrap();
    socket.send(Message::text("GET")).await.unwrap();

    socket.send(Message::text("GET /a.txt")).await.unwrap();
    let header = next_message(&mut socket).await;
    assert_eq!(header, Message::text("200 5"));
    let body = next_message(&mut socket).await;
    assert_eq!(body, Message::binary(b"alpha".to_vec()));

    socket.send(Message::text("PUT /b.txt")).await.unwrap();
    socket.send(Message::binary(b"beta".to_vec())).await.unwrap();
    let header = next_message(&mut socket).await;
    assert!(header.to_text().unwrap().starts_with("201 "), "{header:?}");
    let _ = next_message(&mut socket).await;
    assert_eq!(std::fs::read(harness.root().join("b.txt")).unwrap(), b"beta");

    socket.send(Message::text("DELETE /b.txt")).await.unwrap();
    let header = next_message(&mut socket).await;
    assert!(header.to_text().unwrap().starts_with("405 "), "{header:?}");
    let _ = next_message(&mut socket).await;

    socket.send(Message::text("GET /_list?dir=%2F")).await.unwrap();
    let header = next_message(&mut socket).await;
    assert!(header.to_text().unwrap().starts_with("200 "), "{header:?}");
    let body = next_message(&mut socket).await;
    let names: Vec<String> = serde_json::from_slice(&body.into_data()).unwrap();
    assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);

    let _ = socket.close(None).await;
    harness.stop().await;
}

async fn next_message<S>(socket: &mut S) -> Message
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match socket.next().await.expect("stream ended").expect("receive") {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}
