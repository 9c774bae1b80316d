//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the WebSocket client, the REST services built on the
//! transport port, and the ambient configuration, logging and metrics setup.

/// User data stream WebSocket client.
pub mod stream;

/// Broker REST services.
pub mod rest;

/// Environment-driven configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
