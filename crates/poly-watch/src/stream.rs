//! Streaming connection to the engine.
//!
//! `StreamClient` keeps one authenticated WebSocket session alive and
//! hides reconnection churn from the rest of the client: the outer loop
//! runs sessions back to back with a fixed delay between attempts, and
//! each session owns its transport and heartbeat timer so that leaving
//! the session function tears both down together.
//!
//! Authentication failure is the one non-recoverable case: the server
//! signals it with close code 4001, the credential store is told to
//! invalidate the session, and the retry loop ends.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{info, trace, warn};

use crate::auth::CredentialStore;
use crate::config::WatchConfig;
use crate::events::{decode_frame, DecodedFrame};
use crate::state::MonitorState;

/// Close code the server uses to reject a missing or invalid token.
pub const AUTH_FAILURE_CLOSE_CODE: u16 = 4001;

/// Errors that can occur on the monitoring stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Stream ended unexpectedly")]
    StreamEnded,

    #[error("Server rejected session credential")]
    AuthRejected,
}

/// How a session ended when it did not fail.
enum SessionEnd {
    /// Consumer-initiated teardown.
    Shutdown,
    /// Server closed with the auth-failure code.
    AuthRejected,
}

/// The connection manager: one live session, perpetual reconnect.
pub struct StreamClient {
    config: WatchConfig,
    store: Arc<MonitorState>,
    credentials: Arc<dyn CredentialStore>,
}

impl StreamClient {
    pub fn new(
        config: WatchConfig,
        store: Arc<MonitorState>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
        }
    }

    /// Run the stream until shutdown or auth rejection.
    ///
    /// Returns without connecting when no credential is present. For
    /// any transient failure the next attempt is scheduled after the
    /// fixed reconnect delay; the delay race against `shutdown`
    /// guarantees a pending reconnect never fires after teardown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), StreamError> {
        loop {
            if shutdown.try_recv().is_ok() {
                info!("stream client: shutdown signal received");
                return Ok(());
            }

            let Some(token) = self.credentials.token() else {
                info!("no session credential, stream client not connecting");
                return Ok(());
            };

            let result = self.run_session(&token, &mut shutdown).await;
            self.store.set_connected(false);

            match result {
                Ok(SessionEnd::Shutdown) => {
                    info!("stream client: clean shutdown");
                    return Ok(());
                }
                Ok(SessionEnd::AuthRejected) => {
                    warn!("server rejected session credential, not reconnecting");
                    self.credentials.logout();
                    return Err(StreamError::AuthRejected);
                }
                Err(e) => {
                    warn!(
                        "stream error: {}, reconnecting in {:?}",
                        e, self.config.reconnect_delay
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                        _ = shutdown.recv() => {
                            info!("stream client: shutdown during reconnect");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Run a single WebSocket session.
    ///
    /// The transport and the heartbeat interval live in this scope;
    /// every return path drops both, so no timer can outlive its
    /// connection.
    async fn run_session(
        &self,
        token: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<SessionEnd, StreamError> {
        let url = self.config.stream_url(token);
        info!("connecting to {}", self.config.redacted_stream_url());

        let connect_result =
            tokio::time::timeout(self.config.connect_timeout, connect_async(&url)).await;

        let (ws_stream, _) = match connect_result {
            Ok(Ok((stream, response))) => (stream, response),
            Ok(Err(e)) => return Err(StreamError::Connection(e.to_string())),
            Err(_) => return Err(StreamError::Timeout),
        };

        info!("stream connected");
        self.store.set_connected(true);

        let (mut write, mut read) = ws_stream.split();

        let mut heartbeat = interval(self.config.heartbeat_interval);
        // Skip the immediate first tick; the first ping goes out one
        // full interval after connect.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| StreamError::WebSocket(e.to_string()))?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(frame) = &frame {
                                if u16::from(frame.code) == AUTH_FAILURE_CLOSE_CODE {
                                    return Ok(SessionEnd::AuthRejected);
                                }
                            }
                            warn!("stream closed by server: {:?}", frame);
                            return Err(StreamError::StreamEnded);
                        }
                        Some(Err(e)) => {
                            return Err(StreamError::WebSocket(e.to_string()));
                        }
                        None => {
                            return Err(StreamError::StreamEnded);
                        }
                        _ => {}
                    }
                }
                _ = heartbeat.tick() => {
                    write.send(Message::Text("ping".to_string())).await
                        .map_err(|e| StreamError::WebSocket(e.to_string()))?;
                }
                _ = shutdown.recv() => {
                    info!("stream session: shutdown signal received");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    /// Decode one text frame and dispatch it to the projector.
    fn handle_frame(&self, text: &str) {
        match decode_frame(text) {
            DecodedFrame::Event(event) => {
                trace!(kind = event.kind(), "applying stream event");
                self.store.apply(event);
            }
            DecodedFrame::Control => {}
            DecodedFrame::Unknown(kind) => {
                warn!(kind = %kind, "ignoring unknown event kind");
            }
            DecodedFrame::Malformed(e) => {
                warn!("discarding malformed frame: {}", e);
            }
        }
    }
}
