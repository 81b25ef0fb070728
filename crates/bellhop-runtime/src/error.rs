//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

// =============================================================================
// Connector Errors
// =============================================================================

/// Errors reported by a [`Connector`](crate::connector::Connector).
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// The platform side is gone; no further payloads will arrive.
    #[error("connection closed")]
    Closed,

    /// I/O failure while talking to the platform.
    #[error("I/O error: {0}")]
    Io(String),

    /// A payload could not be turned into an event.
    #[error("failed to parse payload: {reason}")]
    Parse {
        /// Reason for failure.
        reason: String,
    },

    /// The event has no platform representation.
    #[error("event '{kind}' cannot be sent by this connector")]
    Unsupported {
        /// Name of the event kind.
        kind: &'static str,
    },

    /// Delivery failed.
    #[error("failed to send: {0}")]
    SendFailed(String),
}

impl ConnectorError {
    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors from the adapter lifecycle.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// `start` was called while the adapter was not idle or stopped.
    #[error("adapter '{name}' is already {state}")]
    AlreadyStarted {
        /// Adapter name.
        name: String,
        /// State the adapter was found in.
        state: &'static str,
    },

    /// `stop` was called on an adapter that is not running.
    #[error("adapter '{0}' is not running")]
    NotRunning(String),

    /// A background loop ended abnormally.
    #[error("adapter '{name}' task failed: {reason}")]
    TaskFailed {
        /// Adapter name.
        name: String,
        /// Join error description.
        reason: String,
    },
}

// =============================================================================
// Module Errors
// =============================================================================

/// Errors from module registration and lifecycle.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// Modules need a non-empty name.
    #[error("module name must not be empty")]
    EmptyName,

    /// Another module already uses this name.
    #[error("module '{0}' is already registered")]
    Duplicate(String),

    /// A module failed to start or stop.
    #[error("module '{name}' failed: {reason}")]
    Failed {
        /// Module name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Adapter lifecycle failure.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ModuleError {
    /// Creates a lifecycle failure for `name`.
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Runtime Errors
// =============================================================================

/// Errors that can occur during runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Module registration failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Listening for shutdown signals failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
