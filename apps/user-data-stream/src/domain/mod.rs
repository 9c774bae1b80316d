//! Domain Layer - Wire-independent records.
//!
//! Plain data types with serde support and no I/O.

/// Push events delivered on the user data stream.
pub mod events;

/// Snapshots returned by `REQUEST` queries.
pub mod snapshots;

/// Broker commission rebate records.
pub mod rebate;
