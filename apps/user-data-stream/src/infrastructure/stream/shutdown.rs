//! Session termination signals.
//!
//! A session ends exactly once, for one [`Termination`] reason. The reason
//! is published on a `watch` channel after the last handler invocation, so
//! observers of [`DoneSignal`] never race a late callback.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The caller asked the session to stop. No error was reported.
    Stopped,
    /// No pong arrived within the configured timeout.
    StaleConnection,
    /// The transport failed or the peer closed the connection.
    ConnectionLost(String),
    /// An inbound frame was not valid JSON.
    ProtocolViolation(String),
}

impl Termination {
    /// Whether the session ended because the caller asked it to.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::StaleConnection => "stale",
            Self::ConnectionLost(_) => "connection_lost",
            Self::ProtocolViolation(_) => "protocol_violation",
        }
    }
}

/// Observable completion of a session.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<Option<Termination>>,
}

impl DoneSignal {
    /// Create a linked publisher/observer pair.
    #[must_use]
    pub fn channel() -> (DonePublisher, Self) {
        let (tx, rx) = watch::channel(None);
        (DonePublisher { tx }, Self { rx })
    }

    /// Wait until the session has ended.
    ///
    /// If the session task disappears without publishing, this resolves to
    /// [`Termination::ConnectionLost`].
    pub async fn wait(&mut self) -> Termination {
        match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => reason
                .clone()
                .unwrap_or_else(|| Termination::ConnectionLost("session ended".to_string())),
            Err(_) => Termination::ConnectionLost("session task exited".to_string()),
        }
    }

    /// Termination reason, if the session has ended.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        self.rx.borrow().clone()
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

/// Publishing side of a [`DoneSignal`].
#[derive(Debug)]
pub struct DonePublisher {
    tx: watch::Sender<Option<Termination>>,
}

impl DonePublisher {
    /// Publish the termination reason. Only the first call has any effect.
    pub fn publish(&self, termination: Termination) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(termination);
            true
        });
    }
}

/// Caller-side handle to request a stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Ask the session to stop. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_publish() {
        let (publisher, mut done) = DoneSignal::channel();
        assert!(!done.is_done());

        let observer = done.clone();
        publisher.publish(Termination::StaleConnection);

        let reason = tokio::time::timeout(Duration::from_millis(100), done.wait())
            .await
            .unwrap();
        assert_eq!(reason, Termination::StaleConnection);
        assert_eq!(observer.termination(), Some(Termination::StaleConnection));
    }

    #[test]
    fn first_publish_wins() {
        let (publisher, done) = DoneSignal::channel();
        publisher.publish(Termination::Stopped);
        publisher.publish(Termination::StaleConnection);
        assert_eq!(done.termination(), Some(Termination::Stopped));
    }

    #[tokio::test]
    async fn dropped_publisher_resolves_wait() {
        let (publisher, mut done) = DoneSignal::channel();
        drop(publisher);
        assert!(matches!(done.wait().await, Termination::ConnectionLost(_)));
    }

    #[test]
    fn stop_handle_is_idempotent() {
        let stop = StopHandle::new(CancellationToken::new());
        stop.stop();
        stop.stop();
        assert!(stop.is_stop_requested());
        assert!(Termination::Stopped.is_requested());
        assert!(!Termination::StaleConnection.is_requested());
    }
}
