//! User Data Stream Client
//!
//! Multiplexes push events and correlated `REQUEST`/response queries over a
//! single WebSocket connection.
//!
//! # Components
//!
//! - [`connection`] - Dialing and the serialized write path
//! - [`codec`] - Frame classification and request encoding
//! - [`correlation`] - In-flight request table
//! - [`dispatcher`] - Read loop, routing and teardown
//! - [`heartbeat`] - Ping/pong liveness monitor
//! - [`shutdown`] - Stop handle and termination signal
//! - [`service`] - Typed request facade

pub mod codec;
pub mod connection;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod messages;
pub mod service;
pub mod shutdown;

pub use codec::{Decoded, FrameClass, InboundFrame, JsonCodec};
pub use connection::Session;
pub use correlation::{CorrelationTable, ResultCallback};
pub use error::{ConnectionError, ProtocolError, StreamError};
pub use handler::{ErrorHandler, EventHandler};
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor, HeartbeatState, PingSink};
pub use messages::{RemoteError, RequestKind, StreamRequest, StreamResponse, StreamResult};
pub use service::{SessionHandle, UserDataStreamService};
pub use shutdown::{DoneSignal, StopHandle, Termination};
