//! Outbound message routing.
//!
//! Sending is itself an event: [`Bus::send`] emits a `send_message.*` event
//! carrying the message and its destination, and whichever adapter produced
//! the originating context picks it up and delivers it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::Bus;
use crate::context::Context;
use crate::error::{BusError, BusResult};
use crate::event::{Event, kinds};

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Target {
    /// A direct message to a user.
    Private {
        /// Recipient.
        user_id: i64,
    },
    /// A message to a group.
    Group {
        /// Recipient group.
        group_id: i64,
    },
}

impl Target {
    /// Shorthand for [`Target::Private`].
    pub fn private(user_id: i64) -> Self {
        Self::Private { user_id }
    }

    /// Shorthand for [`Target::Group`].
    pub fn group(group_id: i64) -> Self {
        Self::Group { group_id }
    }

    /// Derives the reply destination from the addressing already present on
    /// `event`.
    ///
    /// Message events are routed by their `message_type`. Any other event
    /// goes to its `group_id` if it has one, else to its `user_id`.
    pub fn reply_to(event: &Event) -> BusResult<Self> {
        let no_route = || BusError::NoRoute {
            kind: event.kind().name(),
        };

        if event.is(&kinds::MESSAGE)
            && let Some(message_type) = event.get_str("message_type")
        {
            return match message_type {
                "private" => event.get_i64("user_id").map(Self::private).ok_or_else(no_route),
                "group" => event.get_i64("group_id").map(Self::group).ok_or_else(no_route),
                other => Err(BusError::UnknownMessageType(other.to_owned())),
            };
        }

        event
            .get_i64("group_id")
            .map(Self::group)
            .or_else(|| event.get_i64("user_id").map(Self::private))
            .ok_or_else(no_route)
    }

    /// Builds the `send_message.*` event delivering `message` here.
    pub fn outbound_event(self, message: impl Into<Value>) -> Event {
        match self {
            Self::Private { user_id } => Event::new(&kinds::SEND_PRIVATE_MESSAGE)
                .with("message_type", "private")
                .with("user_id", user_id),
            Self::Group { group_id } => Event::new(&kinds::SEND_GROUP_MESSAGE)
                .with("message_type", "group")
                .with("group_id", group_id),
        }
        .with("message", message)
    }

    /// Reads the destination back from a `send_message.*` event.
    pub fn from_outbound(event: &Event) -> Option<Self> {
        if event.is(&kinds::SEND_PRIVATE_MESSAGE) {
            event.get_i64("user_id").map(Self::private)
        } else if event.is(&kinds::SEND_GROUP_MESSAGE) {
            event.get_i64("group_id").map(Self::group)
        } else {
            None
        }
    }
}

impl Bus {
    /// Emits a send request for `message` to `target`.
    ///
    /// The request context inherits the origin of `from`, so the adapter that
    /// produced `from` is the one that delivers the message.
    pub async fn send(
        &self,
        from: Option<&Context>,
        message: impl Into<Value>,
        target: Target,
    ) -> Option<Value> {
        let event = target.outbound_event(message);
        let ctx = match from.and_then(Context::origin_arc) {
            Some(origin) => Context::with_origin(event, origin),
            None => Context::new(event),
        };
        self.emit(ctx).await
    }

    /// Replies to the event in `ctx` using its own addressing.
    pub async fn reply(&self, ctx: &Context, message: impl Into<Value>) -> BusResult<Option<Value>> {
        let target = Target::reply_to(ctx.event())?;
        Ok(self.send(Some(ctx), message, target).await)
    }
}
