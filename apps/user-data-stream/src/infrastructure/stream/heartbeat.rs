//! Liveness Monitor
//!
//! Sends periodic control pings and watches for pongs. When a ping has been
//! outstanding and nothing was heard for longer than the pong timeout, the
//! monitor cancels the session's `done` token and exits; the dispatcher
//! then tears the session down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::error::StreamError;

/// Absolute deadline for writing a single ping frame.
pub const PING_WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Shortest ping interval the monitor will run with.
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Silence after which the connection is considered stale.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    ///
    /// A zero `ping_interval` is raised to [`MIN_PING_INTERVAL`].
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval: clamp_interval(ping_interval),
            pong_timeout,
        }
    }
}

const fn clamp_interval(interval: Duration) -> Duration {
    if interval.is_zero() {
        MIN_PING_INTERVAL
    } else {
        interval
    }
}

/// State shared between the monitor and the dispatcher.
#[derive(Debug)]
pub struct HeartbeatState {
    last_pong: RwLock<Instant>,
    waiting_for_pong: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_pong: RwLock::new(Instant::now()),
            waiting_for_pong: AtomicBool::new(false),
        }
    }

    /// Record that the peer answered.
    pub fn record_pong(&self) {
        *self.last_pong.write() = Instant::now();
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }

    /// Mark that a ping is outstanding.
    pub fn mark_ping_sent(&self) {
        self.waiting_for_pong.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong.load(Ordering::SeqCst)
    }

    /// Time since the last pong.
    #[must_use]
    pub fn time_since_pong(&self) -> Duration {
        self.last_pong.read().elapsed()
    }
}

/// Write path the monitor pings through.
#[async_trait]
pub trait PingSink: Send + Sync {
    /// Write one control ping.
    async fn send_ping(&self) -> Result<(), StreamError>;
}

/// Periodic ping emitter and staleness detector.
pub struct HeartbeatMonitor<S: PingSink> {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    sink: Arc<S>,
    done: CancellationToken,
    shutdown: CancellationToken,
}

impl<S: PingSink> HeartbeatMonitor<S> {
    /// Create a new monitor.
    ///
    /// `done` is cancelled on a pong timeout; `shutdown` ends the monitor
    /// when the session terminates for any other reason.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        state: Arc<HeartbeatState>,
        sink: Arc<S>,
        done: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            sink,
            done,
            shutdown,
        }
    }

    /// Run until shutdown, a pong timeout, or a failed ping write.
    pub async fn run(self) {
        // `interval` panics on a zero period; the field is public.
        let mut interval = tokio::time::interval(clamp_interval(self.config.ping_interval));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::debug!("Liveness monitor stopped");
                    break;
                }
                () = self.done.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    if !self.check_and_ping().await {
                        break;
                    }
                }
            }
        }
    }

    /// Returns `false` when the monitor should exit.
    async fn check_and_ping(&self) -> bool {
        if self.state.is_waiting_for_pong() {
            let elapsed = self.state.time_since_pong();
            if elapsed > self.config.pong_timeout {
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = self.config.pong_timeout.as_millis(),
                    "Pong timeout detected"
                );
                self.done.cancel();
                return false;
            }
        }

        match tokio::time::timeout(PING_WRITE_DEADLINE, self.sink.send_ping()).await {
            Ok(Ok(())) => {
                self.state.mark_ping_sent();
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Ping write failed, stopping liveness monitor");
                false
            }
            Err(_) => {
                tracing::debug!("Ping write deadline exceeded, stopping liveness monitor");
                false
            }
        }
    }
}
