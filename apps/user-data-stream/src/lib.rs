#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::unreadable_literal
    )
)]

//! User Data Stream - Exchange Account Stream Client
//!
//! A WebSocket client for an exchange user data stream. One connection
//! carries both unsolicited account events and `REQUEST`/response snapshot
//! queries, correlated by a numeric ID.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Wire-independent records
//!   - `events`: Push events (account, order, config, margin call)
//!   - `snapshots`: Position, balance and account snapshots
//!   - `rebate`: Broker commission rebate records
//!
//! - **Application**: Port definitions
//!   - `ports`: REST transport interface
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: Connection, dispatcher, correlation table, liveness monitor
//!   - `rest`: Broker rebate services
//!   - `config`, `telemetry`, `metrics`: Ambient setup
//!
//! # Data Flow
//!
//! ```text
//!  caller ──request_*──► Session ──REQUEST──►  exchange
//!                          │ register id          │
//!                          ▼                      │
//!                   CorrelationTable ◄──response──┤
//!                          │                      │
//!  typed handler ◄─────────┘   event handler ◄────┘ (no id)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Records with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::UserDataEvent;
pub use domain::snapshots::{AccountInformation, BalanceSnapshot, PositionSnapshot};

// Stream client
pub use infrastructure::stream::{
    ConnectionError, DoneSignal, ProtocolError, SessionHandle, StopHandle, StreamError,
    Termination, UserDataStreamService,
};

// Configuration
pub use infrastructure::config::{ConfigError, Environment, StreamConfig};

// REST services
pub use application::ports::{RestError, RestRequest, RestTransport};
pub use infrastructure::rest::{BrokerFuturesRebateService, BrokerRebateService};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
