//! # Bellhop Runtime
//!
//! Process-level pieces around [`bellhop_core::Bus`]:
//!
//! - [`connector`]: the platform-specific transport trait
//! - [`adapter`]: bounded-concurrency bridge between a connector and the bus
//! - [`module`]: named units of behavior and their lifecycle
//! - [`config`]: layered configuration (files, environment, defaults)
//! - [`logging`]: `tracing` subscriber setup
//! - [`runtime`]: wiring it together with signal handling

pub mod adapter;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod module;
pub mod runtime;

pub use adapter::{Adapter, AdapterState, AdapterStats};
pub use config::{AdapterConfig, BellhopConfig, ConfigLoader};
pub use connector::Connector;
pub use error::{
    AdapterError, AdapterResult, ConfigError, ConfigResult, ConnectorError, ConnectorResult,
    ModuleError, ModuleResult, RuntimeError, RuntimeResult,
};
pub use module::{BoxedModule, Module, ModuleManager, ModuleState};
pub use runtime::{Runtime, RuntimeBuilder};

/// Commonly used items.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::adapter::{Adapter, AdapterStats};
    pub use crate::config::{AdapterConfig, BellhopConfig};
    pub use crate::connector::Connector;
    pub use crate::error::{ConnectorError, ConnectorResult, ModuleError, ModuleResult};
    pub use crate::module::Module;
    pub use crate::runtime::Runtime;
}
