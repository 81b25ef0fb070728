//! Adapter concurrency controller.
//!
//! An [`Adapter`] wraps a [`Connector`] and runs two loops:
//!
//! ```text
//! connector ──receive_one──▶ [receive loop] ──bounded queue──▶ [dispatcher]
//!                                                                   │ spawn (≤ max_concurrent)
//!                                                                   ▼
//!                                                      bus.emit ─▶ bus.reply
//!                                                                   │
//! connector ◀──send_one── send_message handler (origin == adapter) ◀┘
//! ```
//!
//! When the queue is full the receive loop blocks, which stops pulling from
//! the connector. When `max_concurrent` dispatches are in flight the
//! dispatcher stops pulling from the queue. Memory use is therefore bounded by
//! `queue_size + max_concurrent + 1` events.
//!
//! Stopping cancels the receive loop, lets the dispatcher drain whatever is
//! already queued (still respecting the cap), waits for every dispatch to
//! finish, and only then removes the outbound handler so late replies are
//! still delivered.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bellhop_core::{Bus, Context, HandlerId, kinds};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::config::AdapterConfig;
use crate::connector::Connector;
use crate::error::{AdapterError, AdapterResult, ConnectorError, ModuleResult};
use crate::module::Module;

/// Lifecycle of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Never started.
    Idle,
    /// Receiving and dispatching.
    Running,
    /// Stop requested; finishing queued and in-flight events.
    Draining,
    /// Fully stopped. May be started again.
    Stopped,
}

impl AdapterState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time counters of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterStats {
    pub state: AdapterState,
    /// Events handed to the queue since the adapter was created.
    pub received: usize,
    /// Events waiting in the queue.
    pub queued: usize,
    /// Dispatches currently running.
    pub in_flight: usize,
    /// Dispatches finished since the adapter was created.
    pub completed: usize,
}

#[derive(Default)]
struct Counters {
    received: AtomicUsize,
    in_flight: AtomicUsize,
    completed: AtomicUsize,
}

/// Decrements `in_flight` however the dispatch task ends.
struct InFlight(Arc<Counters>);

impl InFlight {
    fn enter(counters: &Arc<Counters>) -> Self {
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handles of a running adapter.
struct Running {
    token: CancellationToken,
    queue: mpsc::Sender<Arc<Context>>,
    receiver: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    outbound: HandlerId,
    bus: Arc<Bus>,
}

/// Bounded-concurrency bridge between a [`Connector`] and the [`Bus`].
pub struct Adapter<C: Connector> {
    name: Arc<str>,
    connector: Arc<C>,
    config: AdapterConfig,
    counters: Arc<Counters>,
    state: Mutex<AdapterState>,
    running: Mutex<Option<Running>>,
}

impl<C: Connector> Adapter<C> {
    /// Creates an idle adapter with default settings.
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, AdapterConfig::default())
    }

    /// Creates an idle adapter.
    ///
    /// `max_concurrent` and `queue_size` are raised to at least 1.
    pub fn with_config(connector: C, mut config: AdapterConfig) -> Self {
        config.max_concurrent = config.max_concurrent.max(1);
        config.queue_size = config.queue_size.max(1);
        Self {
            name: Arc::from(connector.name()),
            connector: Arc::new(connector),
            config,
            counters: Arc::default(),
            state: Mutex::new(AdapterState::Idle),
            running: Mutex::new(None),
        }
    }

    /// Adapter name, taken from the connector.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped connector.
    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Effective settings.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    /// Current counters.
    pub fn stats(&self) -> AdapterStats {
        let queued = self
            .running
            .lock()
            .as_ref()
            .map(|running| running.queue.max_capacity() - running.queue.capacity())
            .unwrap_or(0);
        AdapterStats {
            state: self.state(),
            received: self.counters.received.load(Ordering::SeqCst),
            queued,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
        }
    }

    /// Spawns the receive loop and the dispatcher and starts delivering
    /// outbound messages for this adapter.
    ///
    /// # Errors
    ///
    /// [`AdapterError::AlreadyStarted`] unless the adapter is idle or stopped.
    pub fn start(&self, bus: Arc<Bus>) -> AdapterResult<()> {
        {
            let mut state = self.state.lock();
            if matches!(*state, AdapterState::Running | AdapterState::Draining) {
                return Err(AdapterError::AlreadyStarted {
                    name: self.name.to_string(),
                    state: state.as_str(),
                });
            }
            *state = AdapterState::Running;
        }

        let outbound = self.register_outbound(&bus);
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_size);

        let receiver = tokio::spawn(
            receive_loop(
                Arc::clone(&self.connector),
                Arc::clone(&self.name),
                tx.clone(),
                token.clone(),
                self.config.clone(),
                Arc::clone(&self.counters),
            )
            .instrument(info_span!("receive", adapter = %self.name)),
        );
        let dispatcher = tokio::spawn(
            dispatch_loop(
                rx,
                Arc::clone(&bus),
                token.clone(),
                self.config.clone(),
                Arc::clone(&self.counters),
            )
            .instrument(info_span!("dispatch", adapter = %self.name)),
        );

        *self.running.lock() = Some(Running {
            token,
            queue: tx,
            receiver,
            dispatcher,
            outbound,
            bus,
        });
        info!(
            adapter = %self.name,
            max_concurrent = self.config.max_concurrent,
            queue_size = self.config.queue_size,
            "Adapter started"
        );
        Ok(())
    }

    /// Stops receiving, drains queued events, waits for in-flight dispatches
    /// and removes the outbound handler.
    ///
    /// # Errors
    ///
    /// [`AdapterError::NotRunning`] if the adapter was not started.
    /// [`AdapterError::TaskFailed`] if a loop panicked; the adapter still ends
    /// up stopped.
    pub async fn stop(&self) -> AdapterResult<()> {
        let Some(running) = self.running.lock().take() else {
            return Err(AdapterError::NotRunning(self.name.to_string()));
        };
        *self.state.lock() = AdapterState::Draining;
        info!(adapter = %self.name, "Adapter draining");

        running.token.cancel();
        drop(running.queue);
        let receiver = running.receiver.await;
        let dispatcher = running.dispatcher.await;

        running.bus.unregister(running.outbound);
        *self.state.lock() = AdapterState::Stopped;
        info!(adapter = %self.name, "Adapter stopped");

        receiver
            .and(dispatcher)
            .map_err(|e| AdapterError::TaskFailed {
                name: self.name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Routes `send_message` events that originated here to the connector.
    fn register_outbound(&self, bus: &Bus) -> HandlerId {
        let origin = Arc::clone(&self.name);
        let connector = Arc::clone(&self.connector);
        bus.on(&kinds::SEND_MESSAGE)
            .owner(Arc::clone(&self.name))
            .filter_fn(move |ctx| ctx.origin() == Some(&*origin))
            .handle(move |ctx: Arc<Context>| {
                let connector = Arc::clone(&connector);
                async move {
                    let outbound = connector.to_platform_payload(ctx.event())?;
                    connector.send_one(outbound).await?;
                    trace!(adapter = %connector.name(), "Message delivered");
                    Ok::<_, ConnectorError>(())
                }
            })
    }
}

impl<C: Connector> fmt::Debug for Adapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl<C: Connector> Module for Adapter<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
        Adapter::start(self, bus)?;
        Ok(())
    }

    async fn stop(&self, _bus: Arc<Bus>) -> ModuleResult<()> {
        Adapter::stop(self).await?;
        Ok(())
    }
}

// =============================================================================
// Loops
// =============================================================================

async fn receive_loop<C: Connector>(
    connector: Arc<C>,
    name: Arc<str>,
    queue: mpsc::Sender<Arc<Context>>,
    token: CancellationToken,
    config: AdapterConfig,
    counters: Arc<Counters>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            received = connector.receive_one() => received,
        };

        let payload = match received {
            Ok(payload) => payload,
            Err(ConnectorError::Closed) => {
                info!("Connector closed, no more events will be received");
                break;
            }
            Err(e) => {
                warn!(error = %e, backoff = ?config.retry_backoff(), "Receive failed, retrying");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_backoff()) => continue,
                }
            }
        };

        let event = match connector.to_internal_event(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping payload that could not be translated");
                continue;
            }
        };
        trace!(kind = %event.kind(), "Event received");
        let ctx = Arc::new(Context::with_origin(event, Arc::clone(&name)));

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Adapter stopping, dropping event received during shutdown");
                break;
            }
            sent = queue.send(ctx) => {
                if sent.is_err() {
                    break;
                }
                counters.received.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    debug!("Receive loop finished");
}

async fn dispatch_loop(
    mut queue: mpsc::Receiver<Arc<Context>>,
    bus: Arc<Bus>,
    token: CancellationToken,
    config: AdapterConfig,
    counters: Arc<Counters>,
) {
    let mut tasks = JoinSet::new();

    loop {
        sweep(&mut tasks);
        if tasks.len() >= config.max_concurrent {
            wait_for_slot(&mut tasks, &config).await;
            continue;
        }

        let ctx = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            ctx = queue.recv() => match ctx {
                Some(ctx) => ctx,
                None => break,
            },
        };
        spawn_dispatch(&mut tasks, &bus, ctx, &counters);
    }

    // Drain what was accepted before the stop.
    queue.close();
    let mut drained = 0usize;
    while let Some(ctx) = queue.recv().await {
        while tasks.len() >= config.max_concurrent {
            wait_for_slot(&mut tasks, &config).await;
        }
        spawn_dispatch(&mut tasks, &bus, ctx, &counters);
        drained += 1;
    }
    if drained > 0 {
        debug!(drained, "Dispatched queued events during shutdown");
    }

    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    debug!("Dispatcher finished");
}

fn spawn_dispatch(
    tasks: &mut JoinSet<()>,
    bus: &Arc<Bus>,
    ctx: Arc<Context>,
    counters: &Arc<Counters>,
) {
    let bus = Arc::clone(bus);
    let guard = InFlight::enter(counters);
    tasks.spawn(async move {
        let _guard = guard;
        if let Some(result) = bus.emit(Arc::clone(&ctx)).await
            && let Err(e) = bus.reply(&ctx, result).await
        {
            warn!(error = %e, kind = %ctx.event().kind(), "Could not route handler result");
        }
    });
}

/// Reaps finished dispatches without waiting.
fn sweep(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        log_join(joined);
    }
}

/// Waits for a dispatch to finish, at most one idle interval.
async fn wait_for_slot(tasks: &mut JoinSet<()>, config: &AdapterConfig) {
    trace!(in_flight = tasks.len(), "Dispatcher at capacity");
    if let Ok(Some(joined)) = tokio::time::timeout(config.idle_interval(), tasks.join_next()).await
    {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined
        && !e.is_cancelled()
    {
        error!(error = %e, "Dispatch task panicked");
    }
}
