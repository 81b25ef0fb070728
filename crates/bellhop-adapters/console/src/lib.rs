//! # Bellhop Console Adapter
//!
//! Talks to the bot from a terminal. Each input line becomes a message event:
//!
//! | Input           | Event                                   |
//! |-----------------|-----------------------------------------|
//! | `#42 hi there`  | group message in group 42 from user 0   |
//! | `@7 hi there`   | private message from user 7             |
//! | `hi there`      | private message from user 0             |
//!
//! Replies are printed as `Bot: [group 42] ...` or `Bot: [user 7] ...`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bellhop_adapter_console::ConsoleConnector;
//! use bellhop_runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! runtime.register_adapter(ConsoleConnector::stdio()).await?;
//! runtime.run().await?;
//! ```

mod connector;
mod parse;

pub use connector::{ConsoleConnector, StdioConsole};
pub use parse::{ConsoleLine, parse_line, render};
