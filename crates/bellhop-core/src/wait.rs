//! Waiting for the next matching event.
//!
//! [`Bus::wait_for`] registers a temporary handler ahead of every other
//! registration. The first matching event resolves the wait and stops
//! propagation, so a conversation can consume the user's answer without other
//! handlers reacting to it. The temporary handler is removed on every exit
//! path, including the waiting future being dropped.
//!
//! ```rust,ignore
//! bus.reply(&ctx, "What's your name?").await?;
//! let answer = bus
//!     .recv(Some(same_sender(ctx.event())), DEFAULT_WAIT_TIMEOUT)
//!     .await?;
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::bus::Bus;
use crate::context::Context;
use crate::error::{WaitError, WaitResult};
use crate::event::{Event, EventKind, kinds};
use crate::handler::{Filter, HandlerOptions, into_sync_handler, order};
use crate::registry::HandlerId;

/// Timeout used by callers that have no better value.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Removes the temporary handler when the wait ends, however it ends.
struct Unregister<'a> {
    bus: &'a Bus,
    id: HandlerId,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        self.bus.unregister(self.id);
    }
}

impl Bus {
    /// Waits for the next event of `kind` (or a descendant) passing `filter`.
    ///
    /// # Errors
    ///
    /// [`WaitError::Timeout`] if nothing matched within `timeout`, and
    /// [`WaitError::Closed`] if the temporary handler was removed externally.
    pub async fn wait_for(
        &self,
        kind: &'static EventKind,
        filter: Option<Filter>,
        timeout: Duration,
    ) -> WaitResult<Event> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));

        let options = HandlerOptions {
            order: order::WAITER,
            once: true,
            filter,
            ..HandlerOptions::default()
        };
        let id = self.register_boxed(
            kind,
            options,
            into_sync_handler(move |ctx: &Context| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(ctx.event().clone());
                }
                ctx.stop_propagation();
            }),
        );
        let _guard = Unregister { bus: self, id };
        debug!(handler = %id, kind = %kind, ?timeout, "Waiting for event");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(WaitError::Closed),
            Err(_) => Err(WaitError::Timeout(timeout)),
        }
    }

    /// Waits for the next inbound message passing `filter`.
    pub async fn recv(&self, filter: Option<Filter>, timeout: Duration) -> WaitResult<Event> {
        self.wait_for(&kinds::MESSAGE, filter, timeout).await
    }
}

/// Accepts messages from the same sender in the same conversation as `event`.
pub fn same_sender(event: &Event) -> Filter {
    let user_id = event.get_i64("user_id");
    let group_id = event.get_i64("group_id");
    Filter::from_fn(move |ctx| {
        let candidate = ctx.event();
        candidate.get_i64("user_id") == user_id && candidate.get_i64("group_id") == group_id
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::predicate::{attrs, eq};

    #[tokio::test]
    async fn waiter_preempts_other_handlers() {
        let bus = Arc::new(Bus::default());
        let normal = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&normal);
        bus.on(&kinds::MESSAGE)
            .order(order::ADMIN)
            .handle_sync(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let waiter = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                bus.recv(
                    Some(attrs([("user_id", eq(9))]).into()),
                    Duration::from_secs(5),
                )
                .await
            })
        };
        while bus.handler_count(&kinds::MESSAGE) < 2 {
            tokio::task::yield_now().await;
        }

        bus.emit(Event::private_message(1, "other")).await;
        bus.emit(Event::private_message(9, "answer")).await;

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.get("message"), Some(&json!("answer")));
        // The answer was swallowed; the unrelated message was not.
        assert_eq!(normal.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(&kinds::MESSAGE), 1);
    }

    #[tokio::test]
    async fn timeout_removes_waiter() {
        let bus = Bus::default();
        let result = bus
            .wait_for(&kinds::EVENT, None, Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(WaitError::Timeout(_))));
        assert_eq!(bus.handler_count(&kinds::EVENT), 0);
    }

    #[tokio::test]
    async fn dropped_wait_removes_waiter() {
        let bus = Bus::default();
        {
            let mut wait = tokio_test::task::spawn(bus.recv(None, Duration::from_secs(60)));
            tokio_test::assert_pending!(wait.poll());
            assert_eq!(bus.handler_count(&kinds::MESSAGE), 1);
        }
        assert_eq!(bus.handler_count(&kinds::MESSAGE), 0);
    }

    #[test]
    fn same_sender_compares_conversation() {
        let question = Event::group_message(1, 2, "?");
        let filter = same_sender(&question);
        assert!(filter.matches(&Context::new(Event::group_message(1, 2, "a"))));
        assert!(!filter.matches(&Context::new(Event::group_message(3, 2, "a"))));
        assert!(!filter.matches(&Context::new(Event::private_message(2, "a"))));
    }
}
