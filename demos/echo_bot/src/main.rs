//! Echo Bot Example
//!
//! A console bot showing handler ordering, structural filters and a
//! question/answer flow that awaits the user's next message.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! ```
//!
//! Then type, for example:
//!
//! ```text
//! /ping
//! @7 /echo hello
//! #42 /group
//! /ask
//! ```

use std::time::Duration;

use anyhow::Result;
use bellhop::core::predicate::kind;
use bellhop::prelude::*;
use tracing::{info, warn};

/// Extracts the plain text of a message event.
fn message_text(ctx: &Context) -> String {
    ctx.event().get("message").map(plain_text).unwrap_or_default()
}

/// Matches messages whose text starts with `command`.
fn command(command: &'static str) -> Spec {
    attrs([(
        "message",
        func(move |message| plain_text(message).trim().starts_with(command)),
    )])
}

// ============================================================================
// Modules
// ============================================================================

/// Logs every message before any command sees it.
struct Logging;

#[async_trait]
impl Module for Logging {
    fn name(&self) -> &str {
        "logging"
    }

    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
        bus.on(&kinds::MESSAGE)
            .owner("logging")
            .order(order::ADMIN)
            .force()
            .handle_sync(|ctx| {
                let event = ctx.event();
                match event.get_i64("group_id") {
                    Some(group) => info!(
                        group,
                        user = event.get_i64("user_id"),
                        "[Group] {}",
                        message_text(ctx)
                    ),
                    None => info!(user = event.get_i64("user_id"), "[Private] {}", message_text(ctx)),
                }
            });
        Ok(())
    }
}

/// `/ping`, `/echo`, `/group` and `/help`.
struct Commands;

#[async_trait]
impl Module for Commands {
    fn name(&self) -> &str {
        "commands"
    }

    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
        bus.on(&kinds::MESSAGE)
            .owner("commands")
            .filter(command("/ping"))
            .handle_sync(|ctx| {
                ctx.stop_propagation();
                "Pong!"
            });

        bus.on(&kinds::MESSAGE)
            .owner("commands")
            .filter(command("/echo "))
            .handle_sync(|ctx| {
                let text = message_text(ctx);
                text.trim().trim_start_matches("/echo ").to_owned()
            });

        // Only group messages carry a group id, so this filter doubles as a
        // chat-type check.
        bus.on(&kinds::GROUP_MESSAGE)
            .owner("commands")
            .filter(and([command("/group"), attrs([("group_id", kind(ValueKind::Integer))])]))
            .handle_sync(|ctx| {
                let group = ctx.event().get_i64("group_id").unwrap_or_default();
                format!("This is a group-only command! Group ID: {group}")
            });

        bus.on(&kinds::MESSAGE)
            .owner("commands")
            .filter(command("/help"))
            .handle_sync(|_| {
                "Commands:\n  /echo <text>  echo text\n  /ping         pong\n  /group        group only\n  /ask          a short conversation"
            });
        Ok(())
    }
}

/// `/ask` starts a conversation that waits for the same user's reply.
struct Ask;

#[async_trait]
impl Module for Ask {
    fn name(&self) -> &str {
        "ask"
    }

    async fn start(&self, bus: Arc<Bus>) -> ModuleResult<()> {
        let conversation = Arc::clone(&bus);
        bus.on(&kinds::MESSAGE)
            .owner("ask")
            .filter(command("/ask"))
            .handle(move |ctx: Arc<Context>| {
                let bus = Arc::clone(&conversation);
                async move {
                    bus.reply(&ctx, "What's your name?").await?;
                    let answer = bus
                        .recv(Some(same_sender(ctx.event())), Duration::from_secs(30))
                        .await;
                    let reply = match answer {
                        Ok(event) => {
                            let name = event.get("message").map(plain_text).unwrap_or_default();
                            format!("Nice to meet you, {}!", name.trim())
                        }
                        Err(WaitError::Timeout(_)) => "Too slow, ask me again later.".to_owned(),
                        Err(e) => {
                            warn!(error = %e, "Conversation aborted");
                            return Ok(None);
                        }
                    };
                    Ok::<_, BusError>(Some(reply))
                }
            });
        Ok(())
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = Runtime::new();

    runtime.register_module(Logging).await?;
    runtime.register_module(Commands).await?;
    runtime.register_module(Ask).await?;
    runtime.register_adapter(ConsoleConnector::stdio()).await?;

    runtime.run().await?;

    Ok(())
}
