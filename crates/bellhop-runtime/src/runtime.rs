//! Runtime orchestration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bellhop_runtime::Runtime;
//!
//! // Loads bellhop.toml from the current directory, or defaults
//! let runtime = Runtime::new();
//!
//! runtime.register_module(Echo).await?;
//! runtime.register_adapter(ConsoleConnector::stdio()).await?;
//! runtime.run().await?;
//! ```
//!
//! Modules start before adapters so every handler is in place when the first
//! event arrives. Adapters stop first so queued events are still dispatched to
//! live handlers.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bellhop_core::Bus;
use tokio::signal;
use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::config::{AdapterConfig, BellhopConfig, ConfigLoader, ConfigResult};
use crate::connector::Connector;
use crate::error::{ModuleError, RuntimeResult};
use crate::logging::{self, LoggingError};
use crate::module::{Module, ModuleManager, ModuleState};

/// Owns the bus, the modules and the adapters of one bot process.
pub struct Runtime {
    config: BellhopConfig,
    bus: Arc<Bus>,
    modules: ModuleManager,
    adapters: ModuleManager,
    running: AtomicBool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime from `bellhop.toml` in the current directory.
    ///
    /// If loading fails the defaults are used.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                BellhopConfig::default()
            });

        Self::from_config(config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and installs logging.
    pub fn from_config(config: BellhopConfig) -> Self {
        match logging::init_from_config(&config.logging) {
            // Already initialized by the embedding application.
            Ok(()) | Err(LoggingError::Init(_)) => {}
            Err(e) => eprintln!("Warning: {e}, logging is disabled"),
        }

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            once_failure = ?config.bus.once_failure,
            "Runtime initialized from configuration"
        );

        let bus = Arc::new(Bus::new(config.bus.clone()));
        Self {
            modules: ModuleManager::new(Arc::clone(&bus)),
            adapters: ModuleManager::new(Arc::clone(&bus)),
            bus,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BellhopConfig {
        &self.config
    }

    /// The shared dispatch engine.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Settings for the adapter called `name`, or the defaults.
    pub fn adapter_config(&self, name: &str) -> AdapterConfig {
        self.config.adapters.get(name).cloned().unwrap_or_default()
    }

    /// Registers a module. Started by [`start`](Self::start).
    ///
    /// Modules and adapters share one namespace since names tag handler
    /// ownership.
    pub async fn register_module(&self, module: impl Module + 'static) -> RuntimeResult<()> {
        self.ensure_unique(module.name()).await?;
        self.modules.register(Arc::new(module)).await?;
        Ok(())
    }

    /// Wraps `connector` in an [`Adapter`] configured from
    /// `adapters.<connector name>` and registers it.
    ///
    /// The returned handle can be used to inspect [`Adapter::stats`].
    pub async fn register_adapter<C: Connector>(
        &self,
        connector: C,
    ) -> RuntimeResult<Arc<Adapter<C>>> {
        self.ensure_unique(connector.name()).await?;
        let config = self.adapter_config(connector.name());
        let adapter = Arc::new(Adapter::with_config(connector, config));
        self.adapters.register(adapter.clone()).await?;
        Ok(adapter)
    }

    async fn ensure_unique(&self, name: &str) -> Result<(), ModuleError> {
        if self.module_state(name).await.is_some() {
            return Err(ModuleError::Duplicate(name.to_owned()));
        }
        Ok(())
    }

    /// Lifecycle state of the module or adapter called `name`.
    pub async fn module_state(&self, name: &str) -> Option<ModuleState> {
        match self.modules.state(name).await {
            Some(state) => Some(state),
            None => self.adapters.state(name).await,
        }
    }

    /// Whether [`start`](Self::start) has run without a matching stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts all modules, then all adapters.
    ///
    /// Failures are logged and the failing unit is skipped.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return;
        }

        info!("Starting Bellhop runtime");
        let modules = self.modules.start_all().await;
        let adapters = self.adapters.start_all().await;
        info!(modules, adapters, "Runtime started");
    }

    /// Stops all adapters, then all modules.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }

        info!("Stopping Bellhop runtime");
        self.adapters.stop_all().await;
        self.modules.stop_all().await;
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C (or SIGTERM on Unix).
    ///
    /// # Errors
    ///
    /// Fails if no signal handler can be installed; the runtime is stopped
    /// before returning.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await;
        info!("Bellhop runtime is now running. Press Ctrl+C to stop.");

        let signal = wait_for_shutdown().await;
        self.stop().await;
        signal
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        shutdown.await;
        self.stop().await;
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder that loads configuration before creating a [`Runtime`].
///
/// ```rust,ignore
/// let runtime = Runtime::builder()
///     .config_file("deploy/bellhop.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically.
    pub fn merge(mut self, config: BellhopConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<Runtime> {
        let config = self.config_loader.load()?;
        Ok(Runtime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
