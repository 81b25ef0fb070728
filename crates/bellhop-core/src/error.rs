//! Error types for the Bellhop core.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`Bus`](crate::bus::Bus) helpers.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The event carries no addressing a reply could be routed to.
    #[error("no reply route for event '{kind}'")]
    NoRoute {
        /// Name of the event kind.
        kind: &'static str,
    },

    /// The `message_type` attribute holds a value routing does not know.
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),
}

/// Errors returned while waiting for the next matching event.
#[derive(Debug, Clone, Error)]
pub enum WaitError {
    /// No matching event arrived in time.
    #[error("no matching event within {0:?}")]
    Timeout(Duration),

    /// The temporary handler was removed before any event matched.
    #[error("waiter was unregistered before an event matched")]
    Closed,
}

/// A failure reported by a handler body.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for bus helpers.
pub type BusResult<T> = Result<T, BusError>;

/// Result type for waiters.
pub type WaitResult<T> = Result<T, WaitError>;
