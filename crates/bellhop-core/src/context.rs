//! Per-dispatch context.
//!
//! A [`Context`] wraps exactly one [`Event`] for the duration of one
//! [`Bus::emit`](crate::bus::Bus::emit) call and carries the dispatch state:
//! the current result and whether propagation has been stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::event::Event;

/// The envelope handed to handlers during event processing.
///
/// Handlers receive it as `Arc<Context>`; both the result slot and the
/// propagation flag use interior mutability so a handler can update them
/// through a shared reference.
///
/// # Example
///
/// ```rust,ignore
/// bus.on(&kinds::MESSAGE).handle(|ctx: Arc<Context>| async move {
///     if ctx.event().get_i64("user_id") == Some(0) {
///         ctx.stop_propagation();
///     }
/// });
/// ```
pub struct Context {
    event: Event,
    /// Name of the adapter the event came from, if any.
    origin: Option<Arc<str>>,
    result: Mutex<Option<Value>>,
    stopped: AtomicBool,
}

impl Context {
    /// Creates a context with no origin.
    pub fn new(event: Event) -> Self {
        Self {
            event,
            origin: None,
            result: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Creates a context tagged with the adapter that produced the event.
    pub fn with_origin(event: Event, origin: impl Into<Arc<str>>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::new(event)
        }
    }

    /// Returns the wrapped event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns the originating adapter name.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub(crate) fn origin_arc(&self) -> Option<Arc<str>> {
        self.origin.clone()
    }

    /// Returns a copy of the current result.
    pub fn result(&self) -> Option<Value> {
        self.result.lock().clone()
    }

    /// Stores a result. Does not stop propagation by itself.
    pub fn set_result(&self, value: Value) {
        *self.result.lock() = Some(value);
    }

    /// Stops propagation: remaining handlers run only if they are forced.
    pub fn stop_propagation(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once propagation has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("event", &self.event)
            .field("origin", &self.origin)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Anything that can be dispatched: a bare [`Event`] or a prepared [`Context`].
pub trait IntoContext {
    /// Wraps `self` into a shared context.
    fn into_context(self) -> Arc<Context>;
}

impl IntoContext for Event {
    fn into_context(self) -> Arc<Context> {
        Arc::new(Context::new(self))
    }
}

impl IntoContext for Context {
    fn into_context(self) -> Arc<Context> {
        Arc::new(self)
    }
}

impl IntoContext for Arc<Context> {
    fn into_context(self) -> Arc<Context> {
        self
    }
}
