//! Configuration Module
//!
//! Environment-driven configuration for the user data stream client.

mod settings;

pub use settings::{ConfigError, Environment, StreamConfig};
