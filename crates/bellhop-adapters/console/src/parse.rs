//! Line syntax of the console.

use bellhop_core::message::{non_text_types, plain_text, text};
use bellhop_core::{Event, Target};
use bellhop_runtime::{ConnectorError, ConnectorResult};
use serde_json::Value;
use tracing::warn;

/// Sender used when a line carries no `@user` prefix.
pub const DEFAULT_USER: i64 = 0;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// `#<group> text`
    Group { group_id: i64, text: String },
    /// `@<user> text`, or plain text from [`DEFAULT_USER`].
    Private { user_id: i64, text: String },
}

impl ConsoleLine {
    /// Converts the line into a message event.
    pub fn into_event(self) -> Event {
        match self {
            Self::Group { group_id, text: body } => {
                Event::group_message(group_id, DEFAULT_USER, text(body))
            }
            Self::Private { user_id, text: body } => Event::private_message(user_id, text(body)),
        }
    }
}

/// Parses one input line.
///
/// # Errors
///
/// [`ConnectorError::Parse`] if a `#` or `@` prefix is not followed by an
/// integer id.
pub fn parse_line(line: &str) -> ConnectorResult<ConsoleLine> {
    let line = line.trim();
    let Some(sigil) = line.chars().next().filter(|c| matches!(c, '#' | '@')) else {
        return Ok(ConsoleLine::Private {
            user_id: DEFAULT_USER,
            text: line.to_owned(),
        });
    };

    let rest = &line[sigil.len_utf8()..];
    let (id, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let id: i64 = id
        .parse()
        .map_err(|_| ConnectorError::parse(format!("expected an id after '{sigil}', got {id:?}")))?;
    let text = body.trim_start().to_owned();

    Ok(match sigil {
        '#' => ConsoleLine::Group { group_id: id, text },
        _ => ConsoleLine::Private { user_id: id, text },
    })
}

/// Renders a `send_message.*` event as an output line, without the newline.
///
/// # Errors
///
/// [`ConnectorError::Unsupported`] for events that are not send requests.
pub fn render(event: &Event) -> ConnectorResult<String> {
    let target = Target::from_outbound(event).ok_or(ConnectorError::Unsupported {
        kind: event.kind().name(),
    })?;
    let message = event.get("message").unwrap_or(&Value::Null);

    let skipped = non_text_types(message);
    if !skipped.is_empty() {
        warn!(types = ?skipped, "Console cannot display some message nodes");
    }

    let prefix = match target {
        Target::Group { group_id } => format!("[group {group_id}]"),
        Target::Private { user_id } => format!("[user {user_id}]"),
    };
    Ok(format!("Bot: {prefix} {}", plain_text(message)))
}
