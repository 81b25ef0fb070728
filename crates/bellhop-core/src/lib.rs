//! # Bellhop Core
//!
//! The platform-agnostic kernel of the Bellhop bot framework:
//!
//! - [`event`]: statically declared event kind tree and attribute-bag events
//! - [`context`]: per-dispatch envelope with result and propagation state
//! - [`predicate`]: compiler from declarative matcher specs to predicates
//! - [`bus`]: handler registry and dispatch engine
//! - [`outbound`]: reply routing and send requests
//! - [`wait`]: awaiting the next matching event
//!
//! Everything here is runtime-agnostic apart from timers used by
//! [`Bus::wait_for`]. Adapters, modules and configuration live in
//! `bellhop-runtime`.

pub mod bus;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod outbound;
pub mod predicate;
pub mod wait;

mod registry;

pub use bus::{Bus, BusConfig, On, OncePolicy};
pub use context::{Context, IntoContext};
pub use error::{BusError, BusResult, HandlerError, WaitError, WaitResult};
pub use event::{Event, EventKind, kinds};
pub use handler::{BoxedHandler, Filter, HandlerOptions, IntoOutcome, order};
pub use outbound::Target;
pub use predicate::{Predicate, SetSemantics, Spec, ValueKind, compile};
pub use registry::HandlerId;
pub use wait::{DEFAULT_WAIT_TIMEOUT, same_sender};

/// Commonly used items.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::bus::{Bus, BusConfig, OncePolicy};
    pub use crate::context::Context;
    pub use crate::error::{BusError, WaitError};
    pub use crate::event::{Event, EventKind, kinds};
    pub use crate::handler::{Filter, HandlerOptions, order};
    pub use crate::message::{plain_text, text};
    pub use crate::outbound::Target;
    pub use crate::predicate::{
        Predicate, SetSemantics, Spec, ValueKind, absent, and, attrs, compile, eq, exist,
        for_all, func, mapping, not, optional, or, prefix, set, set_with, subsequence,
    };
    pub use crate::registry::HandlerId;
    pub use crate::wait::{DEFAULT_WAIT_TIMEOUT, same_sender};
}
