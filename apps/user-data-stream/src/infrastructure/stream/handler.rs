//! Caller-supplied handlers.
//!
//! Handlers run on the session's dispatcher task, one at a time, but may run
//! concurrently with the caller's own tasks. They should return quickly; a
//! slow handler stalls the reader.

use std::sync::Arc;

use crate::domain::events::UserDataEvent;

use super::error::StreamError;

/// Receives every push event.
pub type EventHandler = Arc<dyn Fn(UserDataEvent) + Send + Sync + 'static>;

/// Receives every error discovered in the background.
pub type ErrorHandler = Arc<dyn Fn(StreamError) + Send + Sync + 'static>;
