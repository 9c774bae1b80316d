//! User Data Stream Service
//!
//! Public entry point. Owns at most one live [`Session`] at a time and exposes
//! the typed snapshot requests on top of it.
//!
//! ```no_run
//! use user_data_stream::infrastructure::config::StreamConfig;
//! use user_data_stream::infrastructure::stream::UserDataStreamService;
//!
//! # async fn demo() -> Result<(), user_data_stream::infrastructure::stream::StreamError> {
//! let service = UserDataStreamService::new(StreamConfig::new("listen-key"), |err| {
//!     tracing::warn!(error = %err, "stream error");
//! });
//! let mut handle = service.start(|event| println!("{}", event.event_type())).await?;
//! service
//!     .request_user_balance(|balance| println!("{}", balance.account_alias))
//!     .await?;
//! handle.stop();
//! handle.done().wait().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, oneshot};

use crate::domain::events::UserDataEvent;
use crate::domain::snapshots::{AccountInformation, BalanceSnapshot, PositionSnapshot};
use crate::infrastructure::config::StreamConfig;
use crate::infrastructure::metrics;

use super::connection::Session;
use super::correlation::ResultCallback;
use super::dispatcher::{Dispatcher, FrameRouter};
use super::error::{ConnectionError, ProtocolError, StreamError};
use super::handler::ErrorHandler;
use super::heartbeat::HeartbeatMonitor;
use super::messages::{RequestKind, StreamResult};
use super::shutdown::{DoneSignal, StopHandle};

// =============================================================================
// Session Handle
// =============================================================================

/// Caller's view of a started session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    stop: StopHandle,
    done: DoneSignal,
}

impl SessionHandle {
    /// Ask the session to stop. No error is reported for a requested stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stop side of the handle, for handing to another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Completion signal, resolved after the last handler invocation.
    #[must_use]
    pub fn done(&mut self) -> &mut DoneSignal {
        &mut self.done
    }
}

// =============================================================================
// Service
// =============================================================================

struct Inner {
    config: StreamConfig,
    on_error: ErrorHandler,
    slot: Mutex<Option<Arc<Session>>>,
}

impl Inner {
    /// Clear the slot if it still holds `session`.
    async fn release(&self, session: &Arc<Session>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|live| Arc::ptr_eq(live, session)) {
            *slot = None;
        }
    }

    async fn live_session(&self) -> Result<Arc<Session>, StreamError> {
        self.slot.lock().await.clone().ok_or(StreamError::NotStarted)
    }
}

/// User data stream client.
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct UserDataStreamService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UserDataStreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataStreamService")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl UserDataStreamService {
    /// Create a service. `on_error` receives every background failure.
    pub fn new<E>(config: StreamConfig, on_error: E) -> Self
    where
        E: Fn(StreamError) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                on_error: Arc::new(on_error),
                slot: Mutex::new(None),
            }),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// Whether a session is currently live.
    pub async fn is_connected(&self) -> bool {
        self.inner.slot.lock().await.is_some()
    }

    /// Dial the stream and start the dispatcher and liveness monitor.
    ///
    /// Returns as soon as the connection is established.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AlreadyConnected`] if a session is live, or
    /// [`ConnectionError::Dial`] if the handshake fails.
    pub async fn start<H>(&self, on_event: H) -> Result<SessionHandle, StreamError>
    where
        H: Fn(UserDataEvent) + Send + Sync + 'static,
    {
        let config = &self.inner.config;

        // Held across the dial so concurrent starts dial at most once.
        let mut slot = self.inner.slot.lock().await;
        if slot.is_some() {
            return Err(ConnectionError::AlreadyConnected.into());
        }

        let (session, reader) = Session::connect(config.ws_base_url(), config.listen_key()).await?;
        let session = Arc::new(session);
        let (publisher, done) = DoneSignal::channel();

        if config.keep_alive() {
            let monitor = HeartbeatMonitor::new(
                config.heartbeat().clone(),
                Arc::clone(session.heartbeat()),
                Arc::clone(&session),
                session.done_token().clone(),
                session.shutdown_token().clone(),
            );
            tokio::spawn(monitor.run());
        }

        let router = FrameRouter::new(
            Arc::clone(session.table()),
            Arc::new(on_event),
            Arc::clone(&self.inner.on_error),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&session),
            reader,
            router,
            config.request_timeout(),
        );

        let inner = Arc::clone(&self.inner);
        let owned = Arc::clone(&session);
        tokio::spawn(async move {
            let termination = dispatcher.run().await;
            inner.release(&owned).await;
            metrics::record_session_terminated(termination.as_str());
            tracing::info!(reason = termination.as_str(), "User data stream session ended");
            publisher.publish(termination);
        });

        let handle = SessionHandle {
            stop: StopHandle::new(session.stop_token().clone()),
            done,
        };
        *slot = Some(session);
        drop(slot);

        tracing::info!(
            environment = config.environment().as_str(),
            keep_alive = config.keep_alive(),
            "User data stream started"
        );
        Ok(handle)
    }

    /// Stop the live session, if any. Idempotent.
    pub async fn stop(&self) {
        if let Some(session) = self.inner.slot.lock().await.as_ref() {
            session.stop_token().cancel();
        }
    }

    // =========================================================================
    // Typed requests
    // =========================================================================

    /// Request the open position snapshot.
    ///
    /// `handler` runs on the dispatcher task once the response arrives.
    /// Decode failures, empty results and timeouts go to the error handler.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotStarted`] without writing anything if no
    /// session is live, or [`StreamError::Write`] if the write fails.
    pub async fn request_user_position<F>(&self, handler: F) -> Result<u64, StreamError>
    where
        F: FnOnce(PositionSnapshot) + Send + 'static,
    {
        self.request(RequestKind::Position, handler).await
    }

    /// Request the asset balance snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::request_user_position`].
    pub async fn request_user_balance<F>(&self, handler: F) -> Result<u64, StreamError>
    where
        F: FnOnce(BalanceSnapshot) + Send + 'static,
    {
        self.request(RequestKind::Balance, handler).await
    }

    /// Request account permissions and fee tier.
    ///
    /// # Errors
    ///
    /// See [`Self::request_user_position`].
    pub async fn request_account_information<F>(&self, handler: F) -> Result<u64, StreamError>
    where
        F: FnOnce(AccountInformation) + Send + 'static,
    {
        self.request(RequestKind::Account, handler).await
    }

    /// Await the open position snapshot.
    ///
    /// # Errors
    ///
    /// Returns the synchronous errors of [`Self::request_user_position`], plus
    /// any decode, empty result or timeout failure of this request. Returns
    /// [`StreamError::ConnectionClosed`] if the session ends first.
    pub async fn fetch_user_position(&self) -> Result<PositionSnapshot, StreamError> {
        self.fetch(RequestKind::Position).await
    }

    /// Await the asset balance snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_user_position`].
    pub async fn fetch_user_balance(&self) -> Result<BalanceSnapshot, StreamError> {
        self.fetch(RequestKind::Balance).await
    }

    /// Await account permissions and fee tier.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_user_position`].
    pub async fn fetch_account_information(&self) -> Result<AccountInformation, StreamError> {
        self.fetch(RequestKind::Account).await
    }

    async fn request<T, F>(&self, kind: RequestKind, handler: F) -> Result<u64, StreamError>
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let session = self.inner.live_session().await?;
        let on_error = Arc::clone(&self.inner.on_error);

        let callback: ResultCallback = Box::new(move |outcome| {
            match outcome.and_then(|result| decode_result::<T>(kind, &result)) {
                Ok(value) => handler(value),
                Err(e) => on_error(e),
            }
        });

        session.send_request(kind, callback).await
    }

    async fn fetch<T>(&self, kind: RequestKind) -> Result<T, StreamError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let session = self.inner.live_session().await?;
        let (tx, rx) = oneshot::channel();

        let callback: ResultCallback = Box::new(move |outcome| {
            let _ = tx.send(outcome.and_then(|result| decode_result::<T>(kind, &result)));
        });
        session.send_request(kind, callback).await?;

        // A dropped sender means the session ended with the entry pending.
        rx.await.unwrap_or(Err(StreamError::ConnectionClosed))
    }
}

fn decode_result<T: DeserializeOwned>(
    kind: RequestKind,
    result: &StreamResult,
) -> Result<T, StreamError> {
    serde_json::from_str(result.res.get()).map_err(|source| {
        ProtocolError::Decode {
            what: kind.as_str(),
            source,
        }
        .into()
    })
}
