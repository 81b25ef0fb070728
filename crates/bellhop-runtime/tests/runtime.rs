use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bellhop_core::{Bus, Event, kinds};
use bellhop_runtime::prelude::*;
use bellhop_runtime::{AdapterState, ConfigLoader, ModuleState};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Connector that forwards sent text to a channel.
struct Loopback {
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    outbox: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Connector for Loopback {
    type Payload = String;
    type Outbound = String;

    fn name(&self) -> &str {
        "loopback"
    }

    async fn receive_one(&self) -> ConnectorResult<String> {
        self.inbox.lock().await.recv().await.ok_or(ConnectorError::Closed)
    }

    async fn send_one(&self, outbound: String) -> ConnectorResult<()> {
        self.outbox
            .send(outbound)
            .map_err(|e| ConnectorError::SendFailed(e.to_string()))
    }

    fn to_internal_event(&self, payload: String) -> ConnectorResult<Event> {
        Ok(Event::private_message(1, payload))
    }

    fn to_platform_payload(&self, event: &Event) -> ConnectorResult<String> {
        Ok(event.get_str("message").unwrap_or_default().to_owned())
    }
}

struct Shout {
    stopped: Arc<Mutex<bool>>,
}

#[async_trait]
impl Module for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
        bus.on(&kinds::MESSAGE)
            .owner("shout")
            .handle_sync(|ctx| ctx.event().get_str("message").map(str::to_uppercase));
        Ok(())
    }

    async fn stop(&self, _bus: Arc<Bus>) -> ModuleResult<()> {
        *self.stopped.lock() = true;
        Ok(())
    }
}

#[tokio::test]
async fn runtime_wires_modules_and_adapters() {
    let mut config = BellhopConfig::default();
    config.adapters.insert(
        "loopback".into(),
        AdapterConfig {
            max_concurrent: 3,
            ..AdapterConfig::default()
        },
    );
    let runtime = Runtime::from_config(config);

    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let adapter = runtime
        .register_adapter(Loopback {
            inbox: tokio::sync::Mutex::new(in_rx),
            outbox: out_tx,
        })
        .await
        .unwrap();
    assert_eq!(adapter.config().max_concurrent, 3);
    assert_eq!(runtime.adapter_config("unknown"), AdapterConfig::default());

    let stopped = Arc::new(Mutex::new(false));
    runtime
        .register_module(Shout {
            stopped: Arc::clone(&stopped),
        })
        .await
        .unwrap();
    assert!(
        runtime
            .register_module(Shout {
                stopped: Arc::default(),
            })
            .await
            .is_err()
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let driver = async {
        in_tx.send("hello".to_owned()).unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), out_rx.recv()).await;
        assert_eq!(reply.unwrap().as_deref(), Some("HELLO"));
        assert!(runtime.is_running());
        shutdown_tx.send(()).unwrap();
    };
    let run = runtime.run_until(async {
        let _ = shutdown_rx.await;
    });
    tokio::join!(run, driver);

    assert!(!runtime.is_running());
    assert!(*stopped.lock());
    assert_eq!(adapter.state(), AdapterState::Stopped);
    assert_eq!(runtime.bus().handler_count(&kinds::EVENT), 0);
}

#[test]
fn builder_rejects_invalid_overrides() {
    let mut config = BellhopConfig::default();
    config.adapters.insert(
        "console".into(),
        AdapterConfig {
            max_concurrent: 0,
            ..AdapterConfig::default()
        },
    );
    let result = ConfigLoader::new()
        .search_path("does-not-exist")
        .without_env()
        .merge(config)
        .load();
    assert!(result.is_err());

    let runtime = Runtime::builder()
        .search_path("does-not-exist")
        .without_env()
        .build();
    assert!(runtime.is_ok());
}

#[tokio::test]
async fn failed_module_does_not_block_startup() {
    struct Broken;

    #[async_trait]
    impl Module for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn start(&self, _bus: Arc<Bus>) -> ModuleResult<()> {
            Err(ModuleError::failed("broken", "no database"))
        }
    }

    let runtime = Runtime::from_config(BellhopConfig::default());
    runtime.register_module(Broken).await.unwrap();
    runtime
        .register_module(Shout {
            stopped: Arc::default(),
        })
        .await
        .unwrap();

    runtime.start().await;
    assert_eq!(
        runtime.bus().emit(Event::private_message(1, "hi")).await,
        Some(serde_json::json!("HI"))
    );
    assert_eq!(runtime.module_state("broken").await, Some(ModuleState::Failed));
    assert_eq!(runtime.module_state("shout").await, Some(ModuleState::Active));
    runtime.stop().await;
}
