//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bellhop_core::BusConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// ```toml
/// [logging]
/// level = "debug"
/// output = "file"
///
/// [bus]
/// once_failure = "retry"
///
/// [adapters.console]
/// max_concurrent = 8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BellhopConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dispatch engine settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Per-adapter settings, keyed by adapter name.
    #[serde(default)]
    pub adapters: HashMap<String, AdapterConfig>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Concurrency settings of one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Maximum number of events dispatched at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Capacity of the queue between the receive loop and the dispatcher.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Pause after a failed receive, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long the dispatcher waits at capacity before sweeping again, in
    /// milliseconds.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

impl AdapterConfig {
    /// Receive retry pause.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Dispatcher sweep interval at capacity.
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_size: default_queue_size(),
            retry_backoff_ms: default_retry_backoff_ms(),
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

fn default_max_concurrent() -> usize {
    100
}

fn default_queue_size() -> usize {
    1000
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_idle_interval_ms() -> u64 {
    100
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file used when `output` is `file`.
    #[serde(default = "default_log_file")]
    pub file_path: PathBuf,

    /// How often the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Number of rolled files to keep. `0` keeps all of them.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-target level overrides, e.g. `bellhop_core = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Which span lifecycle events are logged.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include the event target.
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Include thread ids.
    #[serde(default)]
    pub with_thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub with_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: default_log_file(),
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/latest.log")
}

fn default_max_files() -> usize {
    7
}

fn default_true() -> bool {
    true
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the directive spelling of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line, abbreviated.
    Compact,
    /// Single line with all fields.
    #[default]
    Full,
    /// Multi-line, for development.
    Pretty,
    /// Newline-delimited JSON. Needs the `json-log` feature.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rollover schedule of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}
