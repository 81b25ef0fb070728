use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bellhop_core::{Bus, Context, Event, Target, kinds};
use bellhop_runtime::{
    Adapter, AdapterConfig, AdapterError, AdapterState, Connector, ConnectorError,
    ConnectorResult,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Semaphore, mpsc};

type Inbound = ConnectorResult<(i64, String)>;

/// Connector fed from a channel that records everything it sends.
struct ChannelConnector {
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    pulled: AtomicUsize,
    sent: Mutex<Vec<(Target, Value)>>,
}

impl ChannelConnector {
    fn new() -> (Self, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            inbox: tokio::sync::Mutex::new(rx),
            pulled: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        };
        (connector, tx)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    type Payload = (i64, String);
    type Outbound = (Target, Value);

    fn name(&self) -> &str {
        "test"
    }

    async fn receive_one(&self) -> ConnectorResult<Self::Payload> {
        let next = self.inbox.lock().await.recv().await;
        match next {
            Some(item) => {
                self.pulled.fetch_add(1, Ordering::SeqCst);
                item
            }
            None => Err(ConnectorError::Closed),
        }
    }

    async fn send_one(&self, outbound: Self::Outbound) -> ConnectorResult<()> {
        self.sent.lock().push(outbound);
        Ok(())
    }

    fn to_internal_event(&self, (user_id, text): Self::Payload) -> ConnectorResult<Event> {
        Ok(Event::private_message(user_id, text))
    }

    fn to_platform_payload(&self, event: &Event) -> ConnectorResult<Self::Outbound> {
        let target = Target::from_outbound(event).ok_or(ConnectorError::Unsupported {
            kind: event.kind().name(),
        })?;
        Ok((target, event.get("message").cloned().unwrap_or(Value::Null)))
    }
}

fn config(max_concurrent: usize, queue_size: usize) -> AdapterConfig {
    AdapterConfig {
        max_concurrent,
        queue_size,
        retry_backoff_ms: 10,
        idle_interval_ms: 5,
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

/// Message handler that parks until the gate hands out a permit. Each
/// dispatch consumes one permit.
fn gated_handler(bus: &Bus, gate: &Arc<Semaphore>, reply: bool) {
    let gate = Arc::clone(gate);
    bus.on(&kinds::MESSAGE).handle(move |ctx: Arc<Context>| {
        let gate = Arc::clone(&gate);
        async move {
            gate.acquire().await.unwrap().forget();
            reply.then(|| format!("done {}", ctx.event().get_i64("user_id").unwrap_or(0)))
        }
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backpressure_bounds_buffered_events() {
    const MAX: usize = 2;
    const QUEUE: usize = 3;

    let bus = Arc::new(Bus::default());
    let gate = Arc::new(Semaphore::new(0));
    gated_handler(&bus, &gate, false);

    let (connector, inbox) = ChannelConnector::new();
    let adapter = Adapter::with_config(connector, config(MAX, QUEUE));
    adapter.start(Arc::clone(&bus)).unwrap();
    for i in 0..10 {
        inbox.send(Ok((i, "hi".into()))).unwrap();
    }

    eventually("saturation", || {
        let stats = adapter.stats();
        stats.in_flight == MAX && stats.queued == QUEUE
    })
    .await;
    eventually("receive loop to block", || {
        adapter.connector().pulled.load(Ordering::SeqCst) == MAX + QUEUE + 1
    })
    .await;

    // Nothing more is pulled while the handlers are blocked.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = adapter.stats();
    assert_eq!(adapter.connector().pulled.load(Ordering::SeqCst), MAX + QUEUE + 1);
    assert_eq!(stats.in_flight, MAX);
    assert_eq!(stats.received, MAX + QUEUE);
    assert_eq!(stats.completed, 0);

    // Finishing two dispatches frees exactly two slots, which are refilled.
    gate.add_permits(2);
    eventually("two completions", || adapter.stats().completed == 2).await;
    eventually("slots refilled", || adapter.stats().in_flight == MAX).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stats = adapter.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.in_flight, MAX);
    assert_eq!(stats.queued, QUEUE);

    gate.add_permits(8);
    eventually("all completions", || adapter.stats().completed == 10).await;
    assert_eq!(adapter.stats().in_flight, 0);

    drop(inbox);
    adapter.stop().await.unwrap();
    assert_eq!(adapter.state(), AdapterState::Stopped);
}

#[tokio::test]
async fn results_are_replied_through_the_origin_adapter() {
    let bus = Arc::new(Bus::default());
    bus.on(&kinds::MESSAGE)
        .handle_sync(|ctx| format!("echo: {}", ctx.event().get_str("message").unwrap_or("")));

    let (connector, inbox) = ChannelConnector::new();
    let adapter = Adapter::with_config(connector, config(4, 8));
    adapter.start(Arc::clone(&bus)).unwrap();

    inbox.send(Ok((7, "hi".into()))).unwrap();
    eventually("reply", || !adapter.connector().sent.lock().is_empty()).await;
    assert_eq!(
        adapter.connector().sent.lock().as_slice(),
        &[(Target::private(7), json!("echo: hi"))]
    );

    // Sends that originated elsewhere are not delivered here.
    let foreign = Context::with_origin(Event::private_message(1, "x"), "other");
    bus.send(Some(&foreign), "nope", Target::private(1)).await;
    bus.send(None, "nope", Target::private(1)).await;
    assert_eq!(adapter.connector().sent.lock().len(), 1);

    drop(inbox);
    adapter.stop().await.unwrap();
    assert_eq!(bus.handler_count(&kinds::SEND_MESSAGE), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_drains_queue_before_returning() {
    let bus = Arc::new(Bus::default());
    let gate = Arc::new(Semaphore::new(0));
    gated_handler(&bus, &gate, true);

    let (connector, inbox) = ChannelConnector::new();
    let adapter = Arc::new(Adapter::with_config(connector, config(1, 10)));
    adapter.start(Arc::clone(&bus)).unwrap();
    for i in 0..5 {
        inbox.send(Ok((i, "hi".into()))).unwrap();
    }
    eventually("queue filled", || {
        let stats = adapter.stats();
        stats.in_flight == 1 && stats.queued == 4
    })
    .await;

    let stopping = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.stop().await })
    };
    eventually("draining", || adapter.state() == AdapterState::Draining).await;
    assert!(!stopping.is_finished());

    gate.add_permits(5);
    stopping.await.unwrap().unwrap();

    let stats = adapter.stats();
    assert_eq!(stats.state, AdapterState::Stopped);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.in_flight, 0);
    // Replies produced while draining still went out.
    assert_eq!(adapter.connector().sent.lock().len(), 5);
    assert_eq!(bus.handler_count(&kinds::SEND_MESSAGE), 0);
}

#[tokio::test]
async fn receive_errors_are_retried() {
    let bus = Arc::new(Bus::default());
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    bus.on(&kinds::MESSAGE).handle_sync(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (connector, inbox) = ChannelConnector::new();
    let adapter = Adapter::with_config(connector, config(1, 1));
    adapter.start(Arc::clone(&bus)).unwrap();

    inbox.send(Err(ConnectorError::Io("reset".into()))).unwrap();
    inbox.send(Ok((1, "after".into()))).unwrap();
    eventually("event after retry", || seen.load(Ordering::SeqCst) == 1).await;

    drop(inbox);
    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn lifecycle_misuse_is_rejected() {
    let bus = Arc::new(Bus::default());
    let (connector, _inbox) = ChannelConnector::new();
    let adapter = Adapter::new(connector);
    assert_eq!(adapter.state(), AdapterState::Idle);
    assert!(matches!(adapter.stop().await, Err(AdapterError::NotRunning(_))));

    adapter.start(Arc::clone(&bus)).unwrap();
    assert!(matches!(
        adapter.start(Arc::clone(&bus)),
        Err(AdapterError::AlreadyStarted { state: "running", .. })
    ));

    adapter.stop().await.unwrap();
    // A stopped adapter can be started again.
    adapter.start(Arc::clone(&bus)).unwrap();
    adapter.stop().await.unwrap();
}
