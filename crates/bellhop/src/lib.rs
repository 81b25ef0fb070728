//! # Bellhop
//!
//! An event-bus bot kernel: platform adapters feed events into a shared
//! [`Bus`](core::Bus), where prioritized and filterable handlers react to
//! them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  bounded   ┌────────────┐  ≤ N tasks  ┌─────────────────────────┐
//! │ Connector  │──queue────▶│  Adapter   │────────────▶│ Bus: handlers by order, │
//! │ (platform) │◀──send─────│ dispatcher │◀──reply─────│ ancestors first         │
//! └────────────┘            └────────────┘             └─────────────────────────┘
//! ```
//!
//! - **Events** carry a static kind (`message.group`, `notice.poke`, ...) and
//!   an attribute bag. A handler on `message` also sees `message.group`.
//! - **Handlers** run in ascending order; any of them can stop propagation,
//!   set a result that is sent back as a reply, or run once.
//! - **Predicates** are compiled from declarative specs: attribute matches,
//!   sequence and set patterns, type checks and boolean combinators.
//! - **Adapters** bound both the queue and the number of events dispatched
//!   at once, and drain cleanly on shutdown.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bellhop::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Runtime::new();
//!     runtime
//!         .bus()
//!         .on(&kinds::MESSAGE)
//!         .filter(attrs([("message", func(|m| plain_text(m) == "/ping"))]))
//!         .handle_sync(|_| "pong");
//!     runtime.register_adapter(ConsoleConnector::stdio()).await?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: `bellhop.toml` support
//! - `yaml-config`: `bellhop.yaml` support
//! - `json-log`: JSON log lines
//! - `console`: the stdin/stdout adapter

pub use bellhop_core as core;
pub use bellhop_runtime as runtime;

#[cfg(feature = "console")]
pub use bellhop_adapter_console as console;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use bellhop_core::prelude::*;
    pub use bellhop_runtime::prelude::*;

    #[cfg(feature = "console")]
    pub use bellhop_adapter_console::ConsoleConnector;
}
