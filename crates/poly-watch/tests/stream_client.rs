//! Integration tests for the stream client against a local mock server.
//!
//! These tests verify:
//! - connection lifecycle (credential gating, reconnect, teardown)
//! - auth-failure close handling (logout exactly once, no retry)
//! - heartbeat emission
//! - event projection into the monitor store

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use poly_watch::{
    BotName, BotStatus, CredentialStore, MemoryCredentialStore, MonitorState, StreamClient,
    StreamError, WatchConfig, AUTH_FAILURE_CLOSE_CODE,
};

type Ws = WebSocketStream<TcpStream>;
type BoxFut = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Minimal scripted WebSocket server on an ephemeral port.
///
/// Each accepted connection is counted and handed to the per-test
/// handler; the request URI of the most recent handshake is captured
/// so tests can assert on the token query parameter.
struct MockServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    last_uri: Arc<StdMutex<String>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(usize, Ws) -> BoxFut + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let last_uri = Arc::new(StdMutex::new(String::new()));
        let handler = Arc::new(handler);

        let conns = Arc::clone(&connections);
        let uri_store = Arc::clone(&last_uri);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let n = conns.fetch_add(1, Ordering::SeqCst);
                let uri_clone = Arc::clone(&uri_store);
                let ws = match accept_hdr_async(stream, move |req: &Request, resp: Response| {
                    if let Ok(mut uri) = uri_clone.lock() {
                        *uri = req.uri().to_string();
                    }
                    Ok(resp)
                })
                .await
                {
                    Ok(ws) => ws,
                    Err(_) => continue,
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler(n, ws).await });
            }
        });

        Self {
            addr,
            connections,
            last_uri,
            handle,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn last_uri(&self) -> String {
        self.last_uri.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Credential store that records logout invocations.
#[derive(Default)]
struct RecordingCredentialStore {
    token: StdMutex<Option<String>>,
    logouts: AtomicUsize,
}

impl RecordingCredentialStore {
    fn with_token(token: &str) -> Self {
        Self {
            token: StdMutex::new(Some(token.to_string())),
            logouts: AtomicUsize::new(0),
        }
    }

    fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl CredentialStore for RecordingCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn logout(&self) {
        self.token.lock().unwrap().take();
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config(base_url: String) -> WatchConfig {
    WatchConfig {
        base_url,
        heartbeat_interval: Duration::from_millis(100),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(5),
        ..WatchConfig::default()
    }
}

async fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Handler that keeps the connection open and answers pings until the
/// client goes away.
fn idle_handler(_conn: usize, mut ws: Ws) -> BoxFut {
    Box::pin(async move {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if text == "ping" {
                    let _ = ws.send(Message::Text("pong".to_string())).await;
                }
            }
        }
    })
}

#[tokio::test]
async fn test_no_credential_performs_no_connect() {
    let server = MockServer::spawn(idle_handler).await;
    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(MemoryCredentialStore::new(None));
    let (shutdown_tx, _) = broadcast::channel(4);

    let client = StreamClient::new(
        test_config(server.base_url()),
        Arc::clone(&store),
        credentials,
    );
    let result = client.run(shutdown_tx.subscribe()).await;

    assert!(result.is_ok());
    assert_eq!(server.connection_count(), 0);
    assert!(!store.is_connected());
}

#[tokio::test]
async fn test_events_projected_into_store() {
    let server = MockServer::spawn(|_conn, mut ws: Ws| {
        Box::pin(async move {
            let frames = [
                json!({
                    "type": "initial_state",
                    "sniper": {"status": "running", "cash": 250.0},
                    "clipper": {"status": "stopped"},
                }),
                json!({
                    "type": "state_update",
                    "bot": "clipper",
                    "data": {"status": "running", "cash": 98.25},
                }),
                json!({
                    "type": "trade",
                    "bot": "sniper",
                    "timestamp": "T1",
                    "data": {"pnl": 12.5},
                }),
                json!({
                    "type": "opportunity",
                    "bot": "clipper",
                    "timestamp": "T2",
                    "data": {"arb_pct": 0.02},
                }),
                json!({
                    "type": "scan_activity",
                    "bot": "sniper",
                    "data": {"scan_number": 3},
                }),
                json!({
                    "type": "scan_activity",
                    "bot": "clipper",
                    "data": {"scan_number": 4},
                }),
            ];
            for frame in frames {
                if ws.send(Message::Text(frame.to_string())).await.is_err() {
                    return;
                }
            }
            // Stay up until the client disconnects.
            while ws.next().await.is_some() {}
        })
    })
    .await;

    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(MemoryCredentialStore::new(Some("tok-123".to_string())));
    let (shutdown_tx, _) = broadcast::channel(4);

    let client = StreamClient::new(
        test_config(server.base_url()),
        Arc::clone(&store),
        credentials,
    );
    let rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { client.run(rx).await });

    let store_ref = Arc::clone(&store);
    assert!(
        wait_until(
            move || !store_ref.trade_feed().is_empty() && !store_ref.scan_history().is_empty(),
            Duration::from_secs(2),
        )
        .await,
        "events were not applied in time"
    );

    assert!(store.is_connected());
    assert_eq!(server.last_uri(), "/ws?token=tok-123");

    let sniper = store.bot_state(BotName::Sniper);
    assert_eq!(sniper.status, BotStatus::Running);

    let clipper = store.bot_state(BotName::Clipper);
    assert_eq!(clipper.status, BotStatus::Running);

    let feed = store.trade_feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].bot, BotName::Sniper);
    assert_eq!(feed[0].timestamp.as_deref(), Some("T1"));

    assert_eq!(store.opportunities(BotName::Clipper).len(), 1);

    // Scan activity from the non-designated bot was dropped.
    let scans = store.scan_history();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].summary.scan_number, 3);

    let _ = shutdown_tx.send(());
    let result = handle.await.unwrap();
    assert!(result.is_ok());
    assert!(!store.is_connected());
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = MockServer::spawn(|_conn, mut ws: Ws| {
        Box::pin(async move {
            let _ = ws.send(Message::Close(None)).await;
        })
    })
    .await;

    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(MemoryCredentialStore::new(Some("tok-123".to_string())));
    let (shutdown_tx, _) = broadcast::channel(4);

    let client = StreamClient::new(
        test_config(server.base_url()),
        Arc::clone(&store),
        credentials,
    );
    let rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { client.run(rx).await });

    let connections = Arc::clone(&server.connections);
    assert!(
        wait_until(
            move || connections.load(Ordering::SeqCst) >= 3,
            Duration::from_secs(3),
        )
        .await,
        "client did not keep reconnecting"
    );

    let _ = shutdown_tx.send(());
    let result = handle.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_auth_close_invalidates_session_without_retry() {
    let server = MockServer::spawn(|_conn, mut ws: Ws| {
        Box::pin(async move {
            let _ = ws
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::from(AUTH_FAILURE_CLOSE_CODE),
                    reason: "Invalid token".into(),
                })))
                .await;
        })
    })
    .await;

    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(RecordingCredentialStore::with_token("stale-token"));
    let (shutdown_tx, _) = broadcast::channel(4);

    let client = StreamClient::new(
        test_config(server.base_url()),
        Arc::clone(&store),
        Arc::clone(&credentials) as Arc<dyn CredentialStore>,
    );
    let result = client.run(shutdown_tx.subscribe()).await;

    assert!(matches!(result, Err(StreamError::AuthRejected)));
    assert_eq!(credentials.logout_count(), 1);
    assert!(credentials.token().is_none());

    // Well past the reconnect delay: still exactly one attempt.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(server.connection_count(), 1);
    assert!(!store.is_connected());
}

#[tokio::test]
async fn test_shutdown_during_pending_reconnect() {
    let server = MockServer::spawn(|_conn, mut ws: Ws| {
        Box::pin(async move {
            let _ = ws.send(Message::Close(None)).await;
        })
    })
    .await;

    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(MemoryCredentialStore::new(Some("tok-123".to_string())));
    let (shutdown_tx, _) = broadcast::channel(4);

    let mut config = test_config(server.base_url());
    config.reconnect_delay = Duration::from_millis(500);

    let client = StreamClient::new(config, Arc::clone(&store), credentials);
    let rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { client.run(rx).await });

    let connections = Arc::clone(&server.connections);
    assert!(
        wait_until(
            move || connections.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2),
        )
        .await
    );

    // Give the client time to enter the reconnect wait, then tear down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = shutdown_tx.send(());
    let result = handle.await.unwrap();
    assert!(result.is_ok());

    // The pending reconnect must not fire after teardown.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_heartbeat_pings_sent() {
    let pings = Arc::new(AtomicUsize::new(0));
    let pings_ref = Arc::clone(&pings);
    let server = MockServer::spawn(move |_conn, mut ws: Ws| {
        let pings = Arc::clone(&pings_ref);
        Box::pin(async move {
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    if text == "ping" {
                        pings.fetch_add(1, Ordering::SeqCst);
                        let _ = ws.send(Message::Text("pong".to_string())).await;
                    }
                }
            }
        })
    })
    .await;

    let store = Arc::new(MonitorState::new(BotName::Sniper));
    let credentials = Arc::new(MemoryCredentialStore::new(Some("tok-123".to_string())));
    let (shutdown_tx, _) = broadcast::channel(4);

    let client = StreamClient::new(
        test_config(server.base_url()),
        Arc::clone(&store),
        credentials,
    );
    let rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { client.run(rx).await });

    let pings_ref = Arc::clone(&pings);
    assert!(
        wait_until(
            move || pings_ref.load(Ordering::SeqCst) >= 2,
            Duration::from_secs(2),
        )
        .await,
        "expected at least two heartbeat pings"
    );

    // The "pong" replies were consumed as control frames; nothing
    // should have reached the projector.
    assert!(store.trade_feed().is_empty());

    let _ = shutdown_tx.send(());
    let result = handle.await.unwrap();
    assert!(result.is_ok());
}
