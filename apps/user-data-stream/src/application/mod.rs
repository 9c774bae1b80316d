//! Application Layer - Port definitions.
//!
//! Contracts the infrastructure layer depends on but does not implement.

/// Port interfaces for outbound integrations.
pub mod ports;
