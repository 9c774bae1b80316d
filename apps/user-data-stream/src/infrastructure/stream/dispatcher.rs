//! Inbound Dispatcher
//!
//! A single task per session reads frames in receipt order and routes them:
//! events go to the event handler, responses to the callback registered under
//! their ID, and every background failure to the error handler. Handler
//! invocations are therefore serialized, never concurrent with each other.
//!
//! The same task owns teardown. It races the read loop against the caller's
//! stop signal and the liveness monitor's done signal; a caller stop ends the
//! session without any error report.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use crate::infrastructure::metrics;

use super::codec::{Decoded, FrameClass, InboundFrame, JsonCodec};
use super::connection::{Session, WsReader};
use super::correlation::CorrelationTable;
use super::error::{ProtocolError, StreamError};
use super::handler::{ErrorHandler, EventHandler};
use super::messages::StreamResponse;
use super::shutdown::Termination;

/// Lower bound on the expiry sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on the expiry sweep period.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Frame Router
// =============================================================================

/// Routes decoded frames to handlers and pending callbacks.
pub struct FrameRouter {
    codec: JsonCodec,
    table: Arc<CorrelationTable>,
    on_event: EventHandler,
    on_error: ErrorHandler,
}

impl FrameRouter {
    /// Create a router over a session's correlation table.
    #[must_use]
    pub const fn new(
        table: Arc<CorrelationTable>,
        on_event: EventHandler,
        on_error: ErrorHandler,
    ) -> Self {
        Self {
            codec: JsonCodec::new(),
            table,
            on_event,
            on_error,
        }
    }

    /// Route one text frame.
    ///
    /// Returns a termination reason when the frame ends the session.
    pub fn route_text(&self, text: &str) -> Option<Termination> {
        let decoded = match self.codec.decode(text) {
            Ok(decoded) => decoded,
            Err(e) => {
                let reason = e.to_string();
                self.report(e.into());
                return Some(Termination::ProtocolViolation(reason));
            }
        };

        match decoded {
            Decoded::Frame(InboundFrame::Error(remote)) => {
                metrics::record_frame_received(FrameClass::Error.as_str());
                self.report(
                    ProtocolError::Remote {
                        code: remote.code,
                        msg: remote.msg,
                    }
                    .into(),
                );
            }
            Decoded::Frame(InboundFrame::Event(event)) => {
                metrics::record_frame_received(FrameClass::Event.as_str());
                tracing::trace!(event_type = event.event_type(), "Stream event");
                (self.on_event)(*event);
            }
            Decoded::Frame(InboundFrame::Response(response)) => {
                metrics::record_frame_received(FrameClass::Response.as_str());
                self.route_response(response);
            }
            Decoded::Undecodable(class, e) => {
                metrics::record_frame_received(class.as_str());
                self.report(e.into());
            }
            Decoded::BrokenResponse(id, e) => {
                metrics::record_frame_received(FrameClass::Response.as_str());
                self.fail_response(id, e);
            }
        }

        None
    }

    fn route_response(&self, response: StreamResponse) {
        let id = response.id;
        let Some(entry) = self.table.take(id) else {
            self.report(ProtocolError::UnknownRequest(id).into());
            return;
        };
        metrics::set_pending_requests(self.table.len());

        let kind = entry.kind();
        match response.result.and_then(|results| results.into_iter().next()) {
            Some(first) => {
                metrics::record_request_latency(kind.as_str(), entry.age());
                tracing::debug!(id, kind = kind.as_str(), "Response received");
                entry.complete(Ok(first));
            }
            None => {
                metrics::record_error("protocol");
                entry.complete(Err(ProtocolError::EmptyResult(id).into()));
            }
        }
    }

    /// Complete the request under `id` with a decode failure, so it is not
    /// reported a second time by the expiry sweep.
    fn fail_response(&self, id: u64, error: ProtocolError) {
        let Some(entry) = self.table.take(id) else {
            self.report(error.into());
            return;
        };
        metrics::set_pending_requests(self.table.len());
        metrics::record_error("protocol");
        tracing::warn!(id, kind = entry.kind().as_str(), error = %error, "Undecodable response");
        entry.complete(Err(error.into()));
    }

    /// Fail every request older than `timeout`.
    ///
    /// Returns the number of requests expired.
    pub fn expire(&self, timeout: Duration) -> usize {
        let expired = self.table.take_expired(timeout);
        let count = expired.len();
        for (id, entry) in expired {
            tracing::warn!(id, kind = entry.kind().as_str(), "Request timed out");
            metrics::record_error("timeout");
            entry.complete(Err(StreamError::RequestTimeout { id, after: timeout }));
        }
        if count > 0 {
            metrics::set_pending_requests(self.table.len());
        }
        count
    }

    /// Deliver a background error to the error handler.
    pub fn report(&self, error: StreamError) {
        metrics::record_error(error.kind());
        tracing::warn!(kind = error.kind(), error = %error, "User data stream error");
        (self.on_error)(error);
    }
}

impl std::fmt::Debug for FrameRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRouter")
            .field("pending", &self.table.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Read loop and teardown owner for one session.
pub struct Dispatcher {
    session: Arc<Session>,
    reader: WsReader,
    router: FrameRouter,
    request_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher for a freshly connected session.
    #[must_use]
    pub const fn new(
        session: Arc<Session>,
        reader: WsReader,
        router: FrameRouter,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session,
            reader,
            router,
            request_timeout,
        }
    }

    /// Run until the session terminates.
    ///
    /// On return the shutdown token is cancelled and every pending request
    /// has been dropped without invoking its callback.
    pub async fn run(self) -> Termination {
        let Self {
            session,
            mut reader,
            router,
            request_timeout,
        } = self;

        let stop = session.stop_token().clone();
        let done = session.done_token().clone();

        let mut sweep =
            tokio::time::interval(request_timeout.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let termination = loop {
            tokio::select! {
                biased;

                () = stop.cancelled() => {
                    tracing::info!("Stop requested, closing user data stream");
                    session.close().await;
                    break Termination::Stopped;
                }
                () = done.cancelled() => {
                    let elapsed = session.heartbeat().time_since_pong();
                    router.report(StreamError::StaleConnection { elapsed });
                    session.close().await;
                    break Termination::StaleConnection;
                }
                _ = sweep.tick() => {
                    router.expire(request_timeout);
                }
                message = reader.next() => {
                    match message {
                        Some(Ok(message)) => {
                            if let Some(termination) = handle_message(&router, &session, message).await {
                                if matches!(termination, Termination::ProtocolViolation(_)) {
                                    session.close().await;
                                }
                                break termination;
                            }
                        }
                        Some(Err(e)) => {
                            let reason = e.to_string();
                            router.report(StreamError::Read(e));
                            break Termination::ConnectionLost(reason);
                        }
                        None => {
                            router.report(StreamError::ConnectionClosed);
                            break Termination::ConnectionLost("end of stream".to_string());
                        }
                    }
                }
            }
        };

        session.shutdown_token().cancel();
        let dropped = session.table().clear();
        metrics::set_pending_requests(0);
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped pending requests on teardown");
        }

        termination
    }
}

async fn handle_message(
    router: &FrameRouter,
    session: &Session,
    message: Message,
) -> Option<Termination> {
    match message {
        Message::Text(text) => {
            session.heartbeat().record_pong();
            router.route_text(text.as_str())
        }
        Message::Binary(data) => {
            session.heartbeat().record_pong();
            if let Ok(text) = std::str::from_utf8(&data) {
                router.route_text(text)
            } else {
                tracing::debug!(len = data.len(), "Ignoring non-UTF-8 binary frame");
                None
            }
        }
        Message::Ping(data) => {
            session.heartbeat().record_pong();
            if let Err(e) = session.send_control(Message::Pong(data)).await {
                tracing::debug!(error = %e, "Pong write failed");
            }
            None
        }
        Message::Pong(_) => {
            tracing::trace!("Pong received");
            session.heartbeat().record_pong();
            None
        }
        Message::Close(frame) => {
            tracing::info!(frame = ?frame, "User data stream closed by server");
            router.report(StreamError::ConnectionClosed);
            let reason = frame.map_or_else(
                || "closed by server".to_string(),
                |f| format!("closed by server: {} {}", f.code, f.reason.as_str()),
            );
            Some(Termination::ConnectionLost(reason))
        }
        Message::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::domain::events::UserDataEvent;
    use crate::infrastructure::stream::messages::{RequestKind, StreamResult};

    struct Recorder {
        events: Arc<Mutex<Vec<UserDataEvent>>>,
        errors: Arc<Mutex<Vec<StreamError>>>,
    }

    fn router() -> (FrameRouter, Arc<CorrelationTable>, Recorder) {
        let table = Arc::new(CorrelationTable::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let event_sink = Arc::clone(&events);
        let error_sink = Arc::clone(&errors);
        let router = FrameRouter::new(
            Arc::clone(&table),
            Arc::new(move |event| event_sink.lock().push(event)),
            Arc::new(move |error| error_sink.lock().push(error)),
        );
        (router, table, Recorder { events, errors })
    }

    fn capture(
        slot: &Arc<Mutex<Option<Result<StreamResult, StreamError>>>>,
    ) -> Box<dyn FnOnce(Result<StreamResult, StreamError>) + Send> {
        let slot = Arc::clone(slot);
        Box::new(move |outcome| *slot.lock() = Some(outcome))
    }

    #[test]
    fn response_completes_matching_entry() {
        let (router, table, recorder) = router();
        let slot = Arc::new(Mutex::new(None));
        let id = table.next_id();
        table.register(id, RequestKind::Balance, capture(&slot));

        let frame = format!(r#"{{"id":{id},"result":[{{"req":"x","res":{{"accountAlias":"a","balances":[]}}}}]}}"#);
        assert!(router.route_text(&frame).is_none());

        let outcome = slot.lock().take().expect("callback invoked");
        let result = outcome.expect("successful result");
        assert_eq!(result.req, "x");
        assert!(table.is_empty());
        assert!(recorder.errors.lock().is_empty());
    }

    #[test]
    fn unknown_id_is_reported() {
        let (router, table, recorder) = router();
        let slot = Arc::new(Mutex::new(None));
        let id = table.next_id();
        table.register(id, RequestKind::Position, capture(&slot));

        assert!(router.route_text(r#"{"id":999,"result":[]}"#).is_none());

        assert!(slot.lock().is_none());
        assert_eq!(table.len(), 1);
        let errors = recorder.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            StreamError::Protocol(ProtocolError::UnknownRequest(999))
        ));
    }

    #[test]
    fn empty_result_removes_entry() {
        let (router, table, _recorder) = router();
        let slot = Arc::new(Mutex::new(None));
        let id = table.next_id();
        table.register(id, RequestKind::Account, capture(&slot));

        router.route_text(&format!(r#"{{"id":{id},"result":[]}}"#));

        assert!(table.is_empty());
        let outcome = slot.lock().take().expect("callback invoked");
        assert!(matches!(
            outcome,
            Err(StreamError::Protocol(ProtocolError::EmptyResult(got))) if got == id
        ));
    }

    #[test]
    fn broken_response_completes_entry_once() {
        let (router, table, recorder) = router();
        let slot = Arc::new(Mutex::new(None));
        let id = table.next_id();
        table.register(id, RequestKind::Position, capture(&slot));

        let frame = format!(r#"{{"id":{id},"result":[{{"req":"x"}}]}}"#);
        assert!(router.route_text(&frame).is_none());

        assert!(table.is_empty());
        let outcome = slot.lock().take().expect("callback invoked");
        assert!(matches!(
            outcome,
            Err(StreamError::Protocol(ProtocolError::Decode { what: "response", .. }))
        ));
        assert!(recorder.errors.lock().is_empty());
        assert_eq!(router.expire(Duration::ZERO), 0);
    }

    #[test]
    fn broken_response_with_unknown_id_is_reported() {
        let (router, table, recorder) = router();

        assert!(router.route_text(r#"{"id":42,"result":[{"req":"x"}]}"#).is_none());

        assert!(table.is_empty());
        let errors = recorder.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            StreamError::Protocol(ProtocolError::Decode { what: "response", .. })
        ));
    }

    #[test]
    fn event_frame_skips_correlation() {
        let (router, table, recorder) = router();
        let slot = Arc::new(Mutex::new(None));
        let id = table.next_id();
        table.register(id, RequestKind::Balance, capture(&slot));

        let frame = r#"{"e":"listenKeyExpired","E":1576653824250,"listenKey":"lk"}"#;
        assert!(router.route_text(frame).is_none());

        assert_eq!(recorder.events.lock().len(), 1);
        assert_eq!(table.len(), 1);
        assert!(slot.lock().is_none());
    }

    #[test]
    fn remote_error_continues() {
        let (router, _table, recorder) = router();

        let frame = r#"{"error":{"code":-1121,"msg":"Invalid symbol."}}"#;
        assert!(router.route_text(frame).is_none());

        let errors = recorder.errors.lock();
        assert!(matches!(
            &errors[0],
            StreamError::Protocol(ProtocolError::Remote { code: -1121, .. })
        ));
    }

    #[test]
    fn malformed_frame_terminates() {
        let (router, _table, recorder) = router();

        let termination = router.route_text("not json");

        assert!(matches!(termination, Some(Termination::ProtocolViolation(_))));
        assert!(matches!(
            recorder.errors.lock()[0],
            StreamError::Protocol(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn expire_delivers_timeouts_once() {
        let (router, table, recorder) = router();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = table.next_id();
        let counter = Arc::clone(&calls);
        table.register(
            id,
            RequestKind::Balance,
            Box::new(move |outcome| {
                assert!(matches!(outcome, Err(StreamError::RequestTimeout { .. })));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(router.expire(Duration::ZERO), 1);
        assert_eq!(router.expire(Duration::ZERO), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(recorder.errors.lock().is_empty());
    }
}
