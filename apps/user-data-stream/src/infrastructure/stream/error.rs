//! Stream Error Types
//!
//! Synchronous failures (dial, not started, write) are returned from the
//! call that caused them. Everything the dispatcher or liveness monitor
//! discovers in the background is delivered to the error handler.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Failure to establish a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// A session is already live on this service.
    #[error("websocket already connected")]
    AlreadyConnected,

    /// The WebSocket handshake failed.
    #[error("unable to dial websocket, endpoint: {endpoint}: {source}")]
    Dial {
        /// Endpoint that was dialed.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: Box<tungstenite::Error>,
    },
}

/// A frame could not be understood or was rejected by the peer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Inbound text is not valid JSON.
    #[error("unable to unmarshal JSON response: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The server answered with an error envelope.
    #[error("error response: code: {code}, message: {msg}")]
    Remote {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        msg: String,
    },

    /// A response arrived for an ID with no pending request.
    #[error("no pending request for response, responseID: {0}")]
    UnknownRequest(u64),

    /// A response carried an empty `result` array.
    #[error("response result is empty, responseID: {0}")]
    EmptyResult(u64),

    /// A structurally valid frame failed to decode into its typed form.
    #[error("unable to unmarshal {what}: {source}")]
    Decode {
        /// What was being decoded (event, response, result payload).
        what: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors produced by the user data stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Session could not be established.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A request was issued before the stream was started.
    #[error("data stream is not started")]
    NotStarted,

    /// Writing a frame to the socket failed.
    #[error("unable to write message: {0}")]
    Write(#[source] tungstenite::Error),

    /// A request envelope could not be serialized.
    #[error("unable to marshal request: {0}")]
    Encode(#[source] serde_json::Error),

    /// Reading from the socket failed.
    #[error("unable to read message: {0}")]
    Read(#[source] tungstenite::Error),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Frame-level failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No pong was received within the configured timeout.
    #[error("connection stale: no pong for {elapsed:?}")]
    StaleConnection {
        /// Time since the last pong.
        elapsed: Duration,
    },

    /// A request received no response before its deadline.
    #[error("request {id} timed out after {after:?}")]
    RequestTimeout {
        /// Correlation ID of the expired request.
        id: u64,
        /// Configured request timeout.
        after: Duration,
    },
}

impl StreamError {
    /// Short label used for metrics and structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::NotStarted => "not_started",
            Self::Write(_) => "write",
            Self::Encode(_) => "encode",
            Self::Read(_) => "read",
            Self::ConnectionClosed => "closed",
            Self::Protocol(_) => "protocol",
            Self::StaleConnection { .. } => "stale",
            Self::RequestTimeout { .. } => "timeout",
        }
    }
}
