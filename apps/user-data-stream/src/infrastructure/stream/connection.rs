//! Connection Manager
//!
//! Owns the write half of the user data stream socket. Every outbound frame
//! (requests, pings, pongs, close) goes through [`Session`], which holds the
//! write half behind an async mutex so frames never interleave.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics;

use super::codec::JsonCodec;
use super::correlation::{CorrelationTable, ResultCallback};
use super::error::{ConnectionError, StreamError};
use super::heartbeat::{HeartbeatState, PingSink};
use super::messages::{RequestKind, StreamRequest};

/// Deadline for the best-effort close handshake.
const CLOSE_DEADLINE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of a session socket, consumed by the dispatcher.
pub type WsReader = SplitStream<WsStream>;

type WsWriter = SplitSink<WsStream, Message>;

/// Build the dial URL for a listen key.
#[must_use]
pub fn stream_endpoint(ws_base_url: &str, listen_key: &str) -> String {
    format!("{}/{listen_key}", ws_base_url.trim_end_matches('/'))
}

/// One live connection and the state scoped to it.
pub struct Session {
    endpoint: String,
    listen_key: String,
    codec: JsonCodec,
    writer: Mutex<WsWriter>,
    table: Arc<CorrelationTable>,
    heartbeat: Arc<HeartbeatState>,
    stop: CancellationToken,
    done: CancellationToken,
    shutdown: CancellationToken,
}

impl Session {
    /// Dial `{ws_base_url}/{listen_key}` and split the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Dial`] if the handshake fails.
    pub async fn connect(
        ws_base_url: &str,
        listen_key: &str,
    ) -> Result<(Self, WsReader), StreamError> {
        let endpoint = stream_endpoint(ws_base_url, listen_key);
        tracing::info!(url = %ws_base_url, "Connecting to user data stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| ConnectionError::Dial {
                endpoint: endpoint.clone(),
                source: Box::new(e),
            })?;
        let (writer, reader) = ws_stream.split();

        let session = Self {
            endpoint,
            listen_key: listen_key.to_string(),
            codec: JsonCodec::new(),
            writer: Mutex::new(writer),
            table: Arc::new(CorrelationTable::new()),
            heartbeat: Arc::new(HeartbeatState::new()),
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
            shutdown: CancellationToken::new(),
        };

        tracing::info!("Connected to user data stream");
        Ok((session, reader))
    }

    /// Endpoint this session dialed.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Correlation table for this session.
    #[must_use]
    pub const fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    /// Liveness state shared with the monitor.
    #[must_use]
    pub const fn heartbeat(&self) -> &Arc<HeartbeatState> {
        &self.heartbeat
    }

    /// Caller-initiated stop signal.
    #[must_use]
    pub const fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Fatal or timeout signal, cancelled by the liveness monitor.
    #[must_use]
    pub const fn done_token(&self) -> &CancellationToken {
        &self.done
    }

    /// Cancelled once the dispatcher has exited.
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Register `callback` and write a `REQUEST` for `kind`.
    ///
    /// The entry is registered before the frame is written, both under the
    /// write lock, so a fast response always finds it. If the write fails the
    /// entry is removed again without invoking the callback.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectionClosed`] if the session has already
    /// ended, [`StreamError::Encode`] or [`StreamError::Write`] otherwise.
    pub async fn send_request(
        &self,
        kind: RequestKind,
        callback: ResultCallback,
    ) -> Result<u64, StreamError> {
        if self.shutdown.is_cancelled() {
            return Err(StreamError::ConnectionClosed);
        }

        let mut writer = self.writer.lock().await;
        // The dispatcher may have torn down while this task waited for the lock.
        if self.shutdown.is_cancelled() {
            return Err(StreamError::ConnectionClosed);
        }

        let id = self.table.next_id();
        let request = StreamRequest::snapshot(id, kind, &self.listen_key);
        let text = self.codec.encode(&request).map_err(StreamError::Encode)?;

        self.table.register(id, kind, callback);
        if let Err(e) = writer.send(Message::Text(text.into())).await {
            self.table.take(id);
            metrics::set_pending_requests(self.table.len());
            return Err(StreamError::Write(e));
        }
        drop(writer);

        metrics::record_request_sent(kind.as_str());
        metrics::set_pending_requests(self.table.len());
        tracing::debug!(id, kind = kind.as_str(), "Request sent");
        Ok(id)
    }

    /// Write a control frame.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Write`] if the write fails.
    pub async fn send_control(&self, message: Message) -> Result<(), StreamError> {
        self.writer
            .lock()
            .await
            .send(message)
            .await
            .map_err(StreamError::Write)
    }

    /// Best-effort close handshake. Failures are ignored.
    pub async fn close(&self) {
        let closed = tokio::time::timeout(CLOSE_DEADLINE, async {
            let mut writer = self.writer.lock().await;
            writer.close().await
        })
        .await;

        match closed {
            Ok(Ok(())) => tracing::debug!("Close frame sent"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
            Err(_) => tracing::debug!("Close handshake deadline exceeded"),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("pending", &self.table.len())
            .field("stopped", &self.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PingSink for Session {
    async fn send_ping(&self) -> Result<(), StreamError> {
        self.send_control(Message::Ping(Vec::new().into())).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::infrastructure::stream::messages::StreamResult;

    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("ws://{addr}/ws")
    }

    #[test]
    fn endpoint_joins_listen_key() {
        assert_eq!(
            stream_endpoint("wss://fstream.binance.com/ws", "abc"),
            "wss://fstream.binance.com/ws/abc"
        );
        assert_eq!(
            stream_endpoint("ws://127.0.0.1:9000/ws/", "abc"),
            "ws://127.0.0.1:9000/ws/abc"
        );
    }

    #[tokio::test]
    async fn dial_failure_names_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match Session::connect(&format!("ws://{addr}/ws"), "lk").await {
            Err(StreamError::Connection(ConnectionError::Dial { endpoint, .. })) => {
                assert_eq!(endpoint, format!("ws://{addr}/ws/lk"));
            }
            Err(other) => panic!("expected dial error, got {other:?}"),
            Ok(_) => panic!("dial to a closed port should fail"),
        }
    }

    #[tokio::test]
    async fn request_waiting_on_writer_fails_after_teardown() {
        let url = echo_server().await;
        let (session, _reader) = Session::connect(&url, "lk").await.unwrap();
        let session = Arc::new(session);

        let writer = session.writer.lock().await;
        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                let callback: ResultCallback =
                    Box::new(|_: Result<StreamResult, StreamError>| {});
                session.send_request(RequestKind::Balance, callback).await
            }
        });

        // Let the request pass the entry check and queue on the writer.
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.shutdown_token().cancel();
        session.table().clear();
        drop(writer);

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(StreamError::ConnectionClosed)));
        assert!(session.table().is_empty());
    }
}
