//! User Data Stream Binary
//!
//! Connects to the user data stream, requests the position, balance and
//! account snapshots once, then logs every event until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin user-data-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `USER_STREAM_LISTEN_KEY`: Listen key for the user data stream
//!
//! ## Optional
//! - `USER_STREAM_ENV`: PRODUCTION | TESTNET (default: PRODUCTION)
//! - `USER_STREAM_WS_URL`: Override the WebSocket base URL
//! - `USER_STREAM_API_KEY`: API key for REST calls
//! - `USER_STREAM_KEEP_ALIVE`: Run the ping/pong liveness monitor (default: true)
//! - `USER_STREAM_PING_INTERVAL_SECS`: Ping interval (default: 60)
//! - `USER_STREAM_PONG_TIMEOUT_SECS`: Pong timeout (default: 60)
//! - `USER_STREAM_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
//! - `METRICS_ENABLED`: Install the Prometheus recorder (default: false)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use tokio::signal;
use user_data_stream::infrastructure::telemetry;
use user_data_stream::{
    StreamConfig, StreamError, Termination, UserDataEvent, UserDataStreamService, init_metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting user data stream client");

    if std::env::var("METRICS_ENABLED").is_ok_and(|v| v.eq_ignore_ascii_case("true")) {
        init_metrics().context("failed to install Prometheus recorder")?;
    }

    let config = StreamConfig::from_env().context("invalid stream configuration")?;
    log_config(&config);

    let service = UserDataStreamService::new(config, |err: StreamError| {
        tracing::error!(kind = err.kind(), error = %err, "Stream error");
    });

    let mut handle = service
        .start(log_event)
        .await
        .context("failed to open user data stream")?;

    service
        .request_user_position(|snapshot| {
            tracing::info!(positions = snapshot.positions.len(), "Position snapshot");
        })
        .await?;
    service
        .request_user_balance(|snapshot| {
            tracing::info!(
                account_alias = %snapshot.account_alias,
                balances = snapshot.balances.len(),
                "Balance snapshot"
            );
        })
        .await?;
    service
        .request_account_information(|account| {
            tracing::info!(
                fee_tier = account.fee_tier,
                can_trade = account.can_trade,
                "Account information"
            );
        })
        .await?;

    let mut done = handle.done().clone();
    let termination = tokio::select! {
        () = await_shutdown() => {
            handle.stop();
            handle.done().wait().await
        }
        termination = done.wait() => termination,
    };

    match termination {
        Termination::Stopped => tracing::info!("User data stream stopped"),
        other => tracing::warn!(reason = other.as_str(), detail = ?other, "User data stream ended"),
    }
    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn log_event(event: UserDataEvent) {
    match &event {
        UserDataEvent::ListenKeyExpired(expired) => {
            tracing::warn!(event_time = expired.event_time, "Listen key expired");
        }
        other => tracing::info!(
            event_type = other.event_type(),
            event_time = ?other.event_time(),
            "Stream event"
        ),
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        environment = config.environment().as_str(),
        keep_alive = config.keep_alive(),
        request_timeout_secs = config.request_timeout().as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(ws_base_url = %config.ws_base_url(), "WebSocket endpoint");
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged; a failed Ctrl+C handler
/// resolves immediately so the session is not left unstoppable.
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, stopping user data stream"),
        () = terminate => tracing::info!("Received SIGTERM, stopping user data stream"),
    }
}
