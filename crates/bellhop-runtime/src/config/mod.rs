//! Configuration for the Bellhop runtime.
//!
//! Settings are layered with figment from built-in defaults, `bellhop.toml`
//! or `bellhop.yaml`, and `BELLHOP_*` environment variables. See
//! [`ConfigLoader`] for the search rules.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    AdapterConfig, BellhopConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig,
};
pub use validation::{validate_adapter_config, validate_config};
