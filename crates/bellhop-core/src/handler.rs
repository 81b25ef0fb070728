//! Handler types.
//!
//! A handler is any `Fn(Arc<Context>) -> impl Future<Output = R>` where `R`
//! implements [`IntoOutcome`]. Handlers are erased into [`BoxedHandler`]s at
//! registration so that registries can store them uniformly.
//!
//! # Example
//!
//! ```rust,ignore
//! // No result
//! bus.on(&kinds::MESSAGE).handle(|ctx: Arc<Context>| async move {
//!     tracing::info!(?ctx, "seen");
//! });
//!
//! // A result stops propagation and is returned from `emit`
//! bus.on(&kinds::MESSAGE)
//!     .order(order::BEFORE)
//!     .handle(|_ctx| async { "pong" });
//!
//! // Errors are logged and dispatch continues
//! bus.on(&kinds::MESSAGE).handle(|_ctx| async {
//!     Err::<(), _>("database unavailable")
//! });
//! ```

use std::fmt::{self, Display};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::context::Context;
use crate::error::HandlerError;
use crate::predicate::{Predicate, Spec, compile};

// ============================================================================
// Order
// ============================================================================

/// Well-known handler orders. Lower runs first; any `i32` is accepted.
pub mod order {
    /// Administrative interception, ahead of everything else.
    pub const ADMIN: i32 = 0;
    /// Blocking handlers such as filters and rate limiters.
    pub const BLOCK: i32 = 1;
    /// Pre-processing.
    pub const BEFORE: i32 = 2;
    /// The default.
    pub const NORMAL: i32 = 3;
    /// Post-processing.
    pub const AFTER: i32 = 4;
    /// Fallbacks.
    pub const END: i32 = 5;
    /// Handlers that inspect the final result, usually forced.
    pub const RESULT: i32 = 6;
    /// Temporary waiters; precede every other registration.
    pub const WAITER: i32 = i32::MIN;
}

// ============================================================================
// Outcome
// ============================================================================

/// Converts a handler's return value into a dispatch outcome.
///
/// `Ok(Some(value))` becomes the context result and stops propagation,
/// `Ok(None)` lets dispatch continue and `Err` is logged as a handler failure.
pub trait IntoOutcome: Send {
    /// Performs the conversion.
    fn into_outcome(self) -> Result<Option<Value>, HandlerError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(None)
    }
}

/// `Value::Null` counts as no result.
impl IntoOutcome for Value {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok((!self.is_null()).then_some(self))
    }
}

impl<T: Into<Value> + Send> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(self.map(Into::into).filter(|value: &Value| !value.is_null()))
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(Some(Value::String(self)))
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(Some(Value::from(self)))
    }
}

impl<T: IntoOutcome, E: Display + Send> IntoOutcome for Result<T, E> {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(e) => Err(HandlerError::new(e.to_string())),
        }
    }
}

// ============================================================================
// Boxed Handlers
// ============================================================================

/// A type-erased handler as stored by the registry.
pub type BoxedHandler =
    Arc<dyn Fn(Arc<Context>) -> BoxFuture<'static, Result<Option<Value>, HandlerError>> + Send + Sync>;

/// Erases an async handler.
pub fn into_handler<F, Fut, R>(f: F) -> BoxedHandler
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + 'static,
{
    Arc::new(move |ctx| f(ctx).map(IntoOutcome::into_outcome).boxed())
}

/// Erases a handler that completes without suspending.
pub fn into_sync_handler<F, R>(f: F) -> BoxedHandler
where
    F: Fn(&Context) -> R + Send + Sync + 'static,
    R: IntoOutcome + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx| {
        let f = Arc::clone(&f);
        async move { f(&ctx).into_outcome() }.boxed()
    })
}

// ============================================================================
// Filters
// ============================================================================

/// A type-erased context check.
pub type ContextCheck = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Decides whether a handler sees a given context.
#[derive(Clone)]
pub enum Filter {
    /// A compiled predicate evaluated over the event's attribute object.
    Predicate(Predicate),
    /// An arbitrary check over the whole context.
    Context(ContextCheck),
}

impl Filter {
    /// Builds a filter from a context check.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self::Context(Arc::new(f))
    }

    /// Evaluates the filter.
    pub fn matches(&self, ctx: &Context) -> bool {
        match self {
            Self::Predicate(predicate) => predicate.test(ctx.event().attrs()),
            Self::Context(check) => check(ctx),
        }
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

impl From<Spec> for Filter {
    fn from(spec: Spec) -> Self {
        Self::Predicate(compile(spec))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(predicate) => f.debug_tuple("Predicate").field(predicate).finish(),
            Self::Context(_) => f.write_str("Context(..)"),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Registration options for a handler.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Dispatch priority; lower runs first.
    pub order: i32,
    /// Run even after propagation has been stopped.
    pub force: bool,
    /// Remove after the first invocation.
    pub once: bool,
    /// Optional filter; `None` accepts every context.
    pub filter: Option<Filter>,
    /// Name of the module owning this registration.
    pub owner: Option<Arc<str>>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            order: order::NORMAL,
            force: false,
            once: false,
            filter: None,
            owner: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::Event;
    use crate::predicate::{attrs, func};

    #[test]
    fn outcomes() {
        assert_eq!(().into_outcome().ok(), Some(None));
        assert_eq!(Value::Null.into_outcome().ok(), Some(None));
        assert_eq!(json!(1).into_outcome().ok(), Some(Some(json!(1))));
        assert_eq!(None::<i64>.into_outcome().ok(), Some(None));
        assert_eq!(Some(Value::Null).into_outcome().ok(), Some(None));
        assert_eq!("hi".into_outcome().ok(), Some(Some(json!("hi"))));
        assert_eq!(
            Ok::<_, String>(String::from("ok")).into_outcome().ok(),
            Some(Some(json!("ok")))
        );

        let err = Err::<(), _>("boom").into_outcome().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn filters() {
        let ctx = Context::new(Event::private_message(5, "hi"));

        let by_attrs = Filter::from(attrs([(
            "user_id",
            func(|v| v.as_i64() == Some(5)),
        )]));
        assert!(by_attrs.matches(&ctx));

        let by_ctx = Filter::from_fn(|ctx| ctx.origin() == Some("console"));
        assert!(!by_ctx.matches(&ctx));
    }

    #[tokio::test]
    async fn sync_and_async_handlers_erase_alike() {
        let ctx = Arc::new(Context::new(Event::private_message(1, "x")));

        let sync = into_sync_handler(|ctx: &Context| ctx.event().get_i64("user_id"));
        assert_eq!(sync(Arc::clone(&ctx)).await.ok(), Some(Some(json!(1))));

        let async_handler = into_handler(|_ctx| async { json!({ "done": true }) });
        assert_eq!(
            async_handler(ctx).await.ok(),
            Some(Some(json!({ "done": true })))
        );
    }
}
