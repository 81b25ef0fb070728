//! Module lifecycle management.
//!
//! A [`Module`] is a named unit that registers handlers on the [`Bus`] when it
//! starts. [`ModuleManager`] owns every module and:
//!
//! - rejects empty and duplicate names at registration,
//! - starts modules in registration order, marking failures
//!   [`ModuleState::Failed`] and moving on,
//! - stops active modules in reverse order and removes every handler
//!   registered under the module's name.
//!
//! Handlers registered with `.owner(module.name())` are therefore cleaned up
//! even if the module's own `stop` forgets them.
//!
//! ```rust,ignore
//! struct Echo;
//!
//! #[async_trait]
//! impl Module for Echo {
//!     fn name(&self) -> &str { "echo" }
//!
//!     async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
//!         bus.on(&kinds::MESSAGE).owner("echo").handle_sync(|ctx| plain_text(ctx.event()));
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bellhop_core::Bus;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{ModuleError, ModuleResult};

// =============================================================================
// Module Trait
// =============================================================================

/// A named, startable unit of bot behavior.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique name. Also the owner tag for handlers the module registers.
    fn name(&self) -> &str;

    /// Registers handlers or spawns background work.
    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()>;

    /// Releases resources. Handlers owned by [`name`](Self::name) are removed
    /// by the manager afterwards.
    async fn stop(&self, _bus: Arc<Bus>) -> ModuleResult<()> {
        Ok(())
    }
}

/// A shared module trait object.
pub type BoxedModule = Arc<dyn Module>;

// =============================================================================
// ModuleManager
// =============================================================================

/// Lifecycle state of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Registered but not started, or stopped again.
    Registered,
    /// Started successfully.
    Active,
    /// `start` returned an error; skipped until re-registered.
    Failed,
}

struct ModuleEntry {
    module: BoxedModule,
    state: ModuleState,
}

/// Owns modules and drives their lifecycle.
pub struct ModuleManager {
    bus: Arc<Bus>,
    modules: RwLock<Vec<ModuleEntry>>,
}

impl ModuleManager {
    /// Creates an empty manager for `bus`.
    pub fn new(bus: Arc<Bus>) -> Self {
        Self {
            bus,
            modules: RwLock::new(Vec::new()),
        }
    }

    /// Adds a module in [`ModuleState::Registered`].
    pub async fn register(&self, module: BoxedModule) -> ModuleResult<()> {
        let name = module.name().to_owned();
        if name.is_empty() {
            error!("Refusing to register a module without a name");
            return Err(ModuleError::EmptyName);
        }

        let mut modules = self.modules.write().await;
        if modules.iter().any(|entry| entry.module.name() == name) {
            warn!(module = %name, "Module already registered, ignoring duplicate");
            return Err(ModuleError::Duplicate(name));
        }
        modules.push(ModuleEntry {
            module,
            state: ModuleState::Registered,
        });
        info!(module = %name, "Module registered");
        Ok(())
    }

    /// Number of registered modules.
    pub async fn len(&self) -> usize {
        self.modules.read().await.len()
    }

    /// Whether no module is registered.
    pub async fn is_empty(&self) -> bool {
        self.modules.read().await.is_empty()
    }

    /// Current state of the module called `name`.
    pub async fn state(&self, name: &str) -> Option<ModuleState> {
        self.modules
            .read()
            .await
            .iter()
            .find(|entry| entry.module.name() == name)
            .map(|entry| entry.state)
    }

    /// Starts every registered module in registration order.
    ///
    /// Returns the number of modules that became active.
    pub async fn start_all(&self) -> usize {
        let pending: Vec<(usize, BoxedModule)> = self
            .modules
            .read()
            .await
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.state == ModuleState::Registered)
            .map(|(i, entry)| (i, Arc::clone(&entry.module)))
            .collect();

        let mut started = 0;
        for (i, module) in pending {
            let state = match module.start(Arc::clone(&self.bus)).await {
                Ok(()) => {
                    info!(module = %module.name(), "Module started");
                    started += 1;
                    ModuleState::Active
                }
                Err(e) => {
                    error!(module = %module.name(), error = %e, "Failed to start module");
                    // Drop anything it managed to register before failing.
                    self.bus.unregister_owner(module.name());
                    ModuleState::Failed
                }
            };
            self.modules.write().await[i].state = state;
        }
        started
    }

    /// Stops every active module in reverse registration order.
    pub async fn stop_all(&self) {
        let active: Vec<(usize, BoxedModule)> = self
            .modules
            .read()
            .await
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, entry)| entry.state == ModuleState::Active)
            .map(|(i, entry)| (i, Arc::clone(&entry.module)))
            .collect();

        for (i, module) in active {
            if let Err(e) = module.stop(Arc::clone(&self.bus)).await {
                error!(module = %module.name(), error = %e, "Module failed to stop cleanly");
            }
            let removed = self.bus.unregister_owner(module.name());
            debug!(module = %module.name(), handlers = removed, "Removed module handlers");
            self.modules.write().await[i].state = ModuleState::Registered;
            info!(module = %module.name(), "Module stopped");
        }
    }
}
