use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bellhop_core::prelude::*;
use parking_lot::Mutex;
use serde_json::json;

static NOTICE: EventKind = EventKind::new("notice", &kinds::EVENT);
static POKE: EventKind = EventKind::new("notice.poke", &NOTICE);

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn(&Context) + Send + Sync>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let make = move |name: &'static str| -> Box<dyn Fn(&Context) + Send + Sync> {
        let sink = Arc::clone(&sink);
        Box::new(move |_ctx: &Context| sink.lock().push(name))
    };
    (log, make)
}

#[tokio::test]
async fn ancestors_run_before_leaf_at_equal_order() {
    let bus = Bus::default();
    let (log, record) = recorder();

    for (kind, name, order) in [
        (&POKE, "poke-3", order::NORMAL),
        (&kinds::EVENT, "event-3a", order::NORMAL),
        (&NOTICE, "notice-3", order::NORMAL),
        (&kinds::EVENT, "event-3b", order::NORMAL),
        (&POKE, "poke-1", order::BLOCK),
        (&kinds::EVENT, "event-4", order::AFTER),
    ] {
        let f = record(name);
        bus.on(kind).order(order).handle_sync(move |ctx| f(ctx));
    }

    bus.emit(Event::new(&POKE)).await;
    assert_eq!(
        *log.lock(),
        vec!["poke-1", "event-3a", "event-3b", "notice-3", "poke-3", "event-4"]
    );

    log.lock().clear();
    bus.emit(Event::new(&NOTICE)).await;
    assert_eq!(*log.lock(), vec!["event-3a", "event-3b", "notice-3", "event-4"]);
}

#[tokio::test]
async fn once_handler_fires_exactly_once() {
    let bus = Bus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.on(&kinds::MESSAGE)
        .once()
        .filter(attrs([("user_id", eq(1))]))
        .handle_sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    // Filtered out: does not consume the handler.
    bus.emit(Event::private_message(2, "x")).await;
    assert_eq!(bus.handler_count(&kinds::MESSAGE), 1);

    bus.emit(Event::private_message(1, "x")).await;
    bus.emit(Event::private_message(1, "x")).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.handler_count(&kinds::MESSAGE), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn once_handler_is_not_shared_by_concurrent_emits() {
    let bus = Arc::new(Bus::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.on(&kinds::MESSAGE).once().handle(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let emits: Vec<_> = (0..16)
        .map(|i| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.emit(Event::private_message(i, "x")).await })
        })
        .collect();
    for emit in emits {
        emit.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_skips_plain_handlers_but_not_forced_ones() {
    let bus = Bus::default();
    let (log, record) = recorder();

    let a = record("a");
    bus.on(&kinds::EVENT).order(1).handle_sync(move |ctx| {
        a(ctx);
        ctx.stop_propagation();
    });
    let b = record("b");
    bus.on(&kinds::EVENT).order(2).handle_sync(move |ctx| b(ctx));
    let c = record("c");
    bus.on(&kinds::EVENT).order(2).force().handle_sync(move |ctx| c(ctx));

    let result = bus.emit(Event::new(&kinds::EVENT)).await;
    assert_eq!(result, None);
    assert_eq!(*log.lock(), vec!["a", "c"]);
}

#[tokio::test]
async fn async_and_sync_handlers_interleave_in_order() {
    let bus = Bus::default();
    bus.on(&kinds::MESSAGE).order(order::BEFORE).handle(|ctx: Arc<Context>| async move {
        tokio::task::yield_now().await;
        ctx.set_result(json!("draft"));
    });
    bus.on(&kinds::MESSAGE).handle_sync(|ctx| {
        ctx.result().map(|draft| json!({ "final": draft }))
    });

    let result = bus.emit(Event::private_message(1, "x")).await;
    assert_eq!(result, Some(json!({ "final": "draft" })));
}

#[tokio::test]
async fn owner_teardown_removes_its_handlers() {
    let bus = Bus::default();
    bus.on(&kinds::MESSAGE).owner("weather").handle_sync(|_| "sunny");
    bus.on(&kinds::EVENT).owner("weather").handle_sync(|_| "cloudy");
    bus.on(&kinds::EVENT).owner("echo").order(order::END).handle_sync(|_| "echo");

    assert_eq!(bus.emit(Event::private_message(1, "x")).await, Some(json!("cloudy")));
    assert_eq!(bus.unregister_owner("weather"), 2);
    assert_eq!(bus.emit(Event::private_message(1, "x")).await, Some(json!("echo")));
}
