//! Platform connector trait.
//!
//! A [`Connector`] is the platform-specific half of an adapter: it knows how
//! to pull one payload off the wire, push one payload back, and translate
//! between payloads and [`Event`]s. Everything else (queueing, concurrency
//! limits, reply routing, shutdown) is handled by [`Adapter`](crate::Adapter).
//!
//! # Example
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Connector for WebhookConnector {
//!     type Payload = serde_json::Value;
//!     type Outbound = serde_json::Value;
//!
//!     fn name(&self) -> &str { "webhook" }
//!
//!     async fn receive_one(&self) -> ConnectorResult<Self::Payload> {
//!         self.inbox.lock().await.recv().await.ok_or(ConnectorError::Closed)
//!     }
//!
//!     async fn send_one(&self, outbound: Self::Outbound) -> ConnectorResult<()> {
//!         self.client.post(outbound).await.map_err(|e| ConnectorError::SendFailed(e.to_string()))
//!     }
//!
//!     fn to_internal_event(&self, payload: Self::Payload) -> ConnectorResult<Event> { .. }
//!     fn to_platform_payload(&self, event: &Event) -> ConnectorResult<Self::Outbound> { .. }
//! }
//! ```

use async_trait::async_trait;
use bellhop_core::Event;

use crate::error::ConnectorResult;

/// Platform-specific transport and translation.
///
/// `receive_one` is called from a single loop and may be cancelled when the
/// adapter stops. `send_one` may be called from many dispatch tasks at once.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Raw inbound unit.
    type Payload: Send + 'static;
    /// Raw outbound unit.
    type Outbound: Send + 'static;

    /// Adapter name. Used as the origin of produced contexts and as the
    /// configuration key under `adapters`.
    fn name(&self) -> &str;

    /// Waits for the next payload.
    ///
    /// Returning [`ConnectorError::Closed`](crate::ConnectorError::Closed)
    /// ends the receive loop; any other error is retried after a backoff.
    async fn receive_one(&self) -> ConnectorResult<Self::Payload>;

    /// Delivers one payload.
    async fn send_one(&self, outbound: Self::Outbound) -> ConnectorResult<()>;

    /// Translates an inbound payload.
    fn to_internal_event(&self, payload: Self::Payload) -> ConnectorResult<Event>;

    /// Translates a `send_message.*` event.
    fn to_platform_payload(&self, event: &Event) -> ConnectorResult<Self::Outbound>;
}
