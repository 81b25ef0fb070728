//! The event bus.
//!
//! [`Bus`] owns the handler registry and implements dispatch. It is an
//! explicit instance: construct one, wrap it in an `Arc` and hand it to every
//! component that registers handlers or emits events.
//!
//! # Dispatch
//!
//! For an event of kind `E` with ancestor chain `event → … → E`:
//!
//! 1. The handler lists of every kind in the chain are merged by ascending
//!    order. On equal order, ancestor handlers precede descendant handlers,
//!    then registration order decides.
//! 2. Handlers run one at a time. A handler is skipped if propagation has been
//!    stopped and it is not forced, or if its filter rejects the context.
//! 3. A non-null handler result is stored in the context and stops
//!    propagation. Handler errors and panics are logged and dispatch goes on.
//! 4. Once-handlers are removed after their invocation attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! use bellhop_core::prelude::*;
//!
//! let bus = Arc::new(Bus::default());
//!
//! bus.on(&kinds::MESSAGE)
//!     .order(order::BLOCK)
//!     .filter(attrs([("user_id", eq(0))]))
//!     .handle_sync(|ctx| ctx.stop_propagation());
//!
//! bus.on(&kinds::PRIVATE_MESSAGE).handle(|ctx: Arc<Context>| async move {
//!     Some(format!("echo: {}", plain_text(ctx.event().get("message")?)))
//! });
//!
//! let result = bus.emit(Event::private_message(42, "hi")).await;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, Level, debug, error, span, trace};

use crate::context::{Context, IntoContext};
use crate::event::EventKind;
use crate::handler::{
    BoxedHandler, Filter, HandlerOptions, IntoOutcome, into_handler, into_sync_handler,
};
use crate::registry::{HandlerId, Registration, Registry};

// ============================================================================
// Configuration
// ============================================================================

/// What happens to a once-handler whose invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OncePolicy {
    /// The failed invocation counts; the handler is removed.
    #[default]
    Consume,
    /// The handler stays registered and may fire again.
    Retry,
}

/// Bus behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Treatment of failed once-handlers.
    pub once_failure: OncePolicy,
}

// ============================================================================
// Bus
// ============================================================================

/// Registry and dispatch engine.
///
/// `Bus` is `Send + Sync`; concurrent [`emit`](Self::emit) calls are
/// independent and only contend on the registry lock while snapshotting.
#[derive(Default)]
pub struct Bus {
    registry: Registry,
    config: BusConfig,
}

impl Bus {
    /// Creates a bus with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        Self {
            registry: Registry::default(),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Starts building a registration for `kind`.
    pub fn on(&self, kind: &'static EventKind) -> On<'_> {
        On {
            bus: self,
            kind,
            options: HandlerOptions::default(),
        }
    }

    /// Registers an async handler.
    pub fn register<F, Fut, R>(
        &self,
        kind: &'static EventKind,
        options: HandlerOptions,
        handler: F,
    ) -> HandlerId
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        self.register_boxed(kind, options, into_handler(handler))
    }

    /// Registers an already erased handler.
    pub fn register_boxed(
        &self,
        kind: &'static EventKind,
        options: HandlerOptions,
        handler: BoxedHandler,
    ) -> HandlerId {
        let (order, once, force) = (options.order, options.once, options.force);
        let id = self.registry.insert(kind, options, handler);
        debug!(handler = %id, kind = %kind, order, once, force, "Handler registered");
        id
    }

    /// Removes a registration. Returns `false` if it was already gone.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            debug!(handler = %id, "Handler unregistered");
        }
        removed
    }

    /// Removes every registration owned by `owner`. Returns how many were
    /// removed.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let removed = self.registry.remove_owner(owner);
        debug!(owner, removed, "Owner handlers unregistered");
        removed
    }

    /// Number of handlers registered directly on `kind`.
    pub fn handler_count(&self, kind: &'static EventKind) -> usize {
        self.registry.count(kind)
    }

    /// Dispatches an event or context and returns the final result.
    pub async fn emit(&self, input: impl IntoContext) -> Option<Value> {
        let ctx = input.into_context();
        let kind = ctx.event().kind();
        let span = span!(Level::DEBUG, "emit", kind = %kind);
        self.dispatch(ctx).instrument(span).await
    }

    async fn dispatch(&self, ctx: Arc<Context>) -> Option<Value> {
        let handlers = self.registry.snapshot(ctx.event().kind());
        trace!(handlers = handlers.len(), "Dispatching");

        for registration in handlers {
            if registration.is_removed() {
                continue;
            }
            if ctx.is_stopped() && !registration.force {
                trace!(handler = %registration.id, "Propagation stopped, skipping");
                continue;
            }
            if !self.passes(&registration, &ctx) {
                continue;
            }
            if registration.once && !registration.claim() {
                continue;
            }

            let succeeded = self.invoke(&registration, &ctx).await;

            if registration.once {
                if !succeeded && self.config.once_failure == OncePolicy::Retry {
                    registration.release();
                } else {
                    self.registry.remove(registration.id);
                }
            }
        }

        ctx.result()
    }

    fn passes(&self, registration: &Registration, ctx: &Context) -> bool {
        let Some(filter) = &registration.filter else {
            return true;
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| filter.matches(ctx))) {
            Ok(passed) => passed,
            Err(panic) => {
                error!(
                    handler = %registration.id,
                    kind = %registration.kind,
                    panic = panic_message(&*panic),
                    "Handler filter panicked"
                );
                false
            }
        }
    }

    /// Runs one handler. Returns `false` if it failed or panicked.
    async fn invoke(&self, registration: &Registration, ctx: &Arc<Context>) -> bool {
        let handler = &registration.handler;
        let call = async { handler(Arc::clone(ctx)).await };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(Some(value))) => {
                debug!(handler = %registration.id, "Handler produced a result");
                ctx.set_result(value);
                ctx.stop_propagation();
                true
            }
            Ok(Ok(None)) => true,
            Ok(Err(e)) => {
                error!(
                    handler = %registration.id,
                    kind = %registration.kind,
                    error = %e,
                    "Handler failed"
                );
                false
            }
            Err(panic) => {
                error!(
                    handler = %registration.id,
                    kind = %registration.kind,
                    panic = panic_message(&*panic),
                    "Handler panicked"
                );
                false
            }
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("handlers", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ============================================================================
// Registration Builder
// ============================================================================

/// Builder returned by [`Bus::on`].
#[must_use = "call `handle` or `handle_sync` to register the handler"]
pub struct On<'a> {
    bus: &'a Bus,
    kind: &'static EventKind,
    options: HandlerOptions,
}

impl On<'_> {
    /// Sets the dispatch order. Lower runs first.
    pub fn order(mut self, order: i32) -> Self {
        self.options.order = order;
        self
    }

    /// Runs the handler even after propagation has been stopped.
    pub fn force(mut self) -> Self {
        self.options.force = true;
        self
    }

    /// Removes the handler after its first invocation.
    pub fn once(mut self) -> Self {
        self.options.once = true;
        self
    }

    /// Sets a filter: a compiled [`Predicate`](crate::predicate::Predicate),
    /// a [`Spec`](crate::predicate::Spec) or a [`Filter`].
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.options.filter = Some(filter.into());
        self
    }

    /// Sets a filter over the whole context.
    pub fn filter_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.filter(Filter::from_fn(f))
    }

    /// Tags the registration with its owning module.
    pub fn owner(mut self, owner: impl Into<Arc<str>>) -> Self {
        self.options.owner = Some(owner.into());
        self
    }

    /// Registers an async handler.
    pub fn handle<F, Fut, R>(self, handler: F) -> HandlerId
    where
        F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        self.bus.register(self.kind, self.options, handler)
    }

    /// Registers a handler that does not suspend.
    pub fn handle_sync<F, R>(self, handler: F) -> HandlerId
    where
        F: Fn(&Context) -> R + Send + Sync + 'static,
        R: IntoOutcome + 'static,
    {
        self.bus
            .register_boxed(self.kind, self.options, into_sync_handler(handler))
    }
}
