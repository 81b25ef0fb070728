//! Event system for the Bellhop kernel.
//!
//! Events are attribute bags tagged with an [`EventKind`]. Kinds form a single
//! rooted tree declared statically:
//!
//! ```text
//! event
//! ├── message
//! │   ├── message.private
//! │   └── message.group
//! └── send_message
//!     ├── send_message.private
//!     └── send_message.group
//! ```
//!
//! Handlers registered on a kind observe every event of that kind and of all
//! its descendants, so a handler on [`kinds::EVENT`] observes everything.
//!
//! # Declaring kinds
//!
//! ```rust,ignore
//! use bellhop_core::event::{EventKind, kinds};
//!
//! pub static POKE: EventKind = EventKind::new("notice.poke", &kinds::EVENT);
//!
//! let event = Event::new(&POKE).with("user_id", 42);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};

// ============================================================================
// Event Kinds
// ============================================================================

/// A node in the statically declared event type tree.
///
/// Identity is the address of the `static` that declares the kind, so two
/// kinds with the same name are still distinct. Always refer to kinds through
/// `&'static EventKind`.
pub struct EventKind {
    name: &'static str,
    parent: Option<&'static EventKind>,
}

impl EventKind {
    /// Declares the root of a kind tree. Only [`kinds::EVENT`] should use this.
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Declares a kind whose parent is `parent`.
    pub const fn new(name: &'static str, parent: &'static EventKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Returns the human-readable name of this kind.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the parent kind, or `None` for the root.
    pub fn parent(&self) -> Option<&'static EventKind> {
        self.parent
    }

    /// Returns the ancestor chain ordered root → `self`, inclusive.
    pub fn chain(&'static self) -> Vec<&'static EventKind> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Returns `true` if `self` is `ancestor` or descends from it.
    pub fn is_a(&self, ancestor: &EventKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if std::ptr::eq(kind, ancestor) {
                return true;
            }
            current = kind.parent;
        }
        false
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKind({})", self.name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Built-in event kinds.
pub mod kinds {
    use super::EventKind;

    /// Root of every event. Handlers here see all events.
    pub static EVENT: EventKind = EventKind::root("event");

    /// An inbound chat message. Carries `message_type`, `user_id`, `message`
    /// and, for group messages, `group_id`.
    pub static MESSAGE: EventKind = EventKind::new("message", &EVENT);
    /// A direct message.
    pub static PRIVATE_MESSAGE: EventKind = EventKind::new("message.private", &MESSAGE);
    /// A message posted in a group.
    pub static GROUP_MESSAGE: EventKind = EventKind::new("message.group", &MESSAGE);

    /// An outbound message request. Carries `message`.
    pub static SEND_MESSAGE: EventKind = EventKind::new("send_message", &EVENT);
    /// An outbound direct message. Carries `user_id`.
    pub static SEND_PRIVATE_MESSAGE: EventKind =
        EventKind::new("send_message.private", &SEND_MESSAGE);
    /// An outbound group message. Carries `group_id`.
    pub static SEND_GROUP_MESSAGE: EventKind = EventKind::new("send_message.group", &SEND_MESSAGE);
}

// ============================================================================
// Event
// ============================================================================

/// A typed attribute bag routed by the [`Bus`](crate::bus::Bus).
///
/// Attributes are stored as a JSON object so that predicates compiled from
/// [`Spec`](crate::predicate::Spec) can inspect them directly.
#[derive(Clone)]
pub struct Event {
    kind: &'static EventKind,
    attrs: Value,
}

impl Event {
    /// Creates an event of the given kind with no attributes.
    pub fn new(kind: &'static EventKind) -> Self {
        Self {
            kind,
            attrs: Value::Object(Map::new()),
        }
    }

    /// Creates an event from an existing attribute map.
    pub fn from_attrs(kind: &'static EventKind, attrs: Map<String, Value>) -> Self {
        Self {
            kind,
            attrs: Value::Object(attrs),
        }
    }

    /// Builds an inbound direct message from `user_id`.
    pub fn private_message(user_id: i64, message: impl Into<Value>) -> Self {
        Self::new(&kinds::PRIVATE_MESSAGE)
            .with("message_type", "private")
            .with("user_id", user_id)
            .with("message", message)
    }

    /// Builds an inbound group message posted by `user_id` in `group_id`.
    pub fn group_message(group_id: i64, user_id: i64, message: impl Into<Value>) -> Self {
        Self::new(&kinds::GROUP_MESSAGE)
            .with("message_type", "group")
            .with("group_id", group_id)
            .with("user_id", user_id)
            .with("message", message)
    }

    /// Sets an attribute (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> &'static EventKind {
        self.kind
    }

    /// Returns `true` if this event's kind is `kind` or descends from it.
    pub fn is(&self, kind: &EventKind) -> bool {
        self.kind.is_a(kind)
    }

    /// Returns the attributes as a JSON object value.
    pub fn attrs(&self) -> &Value {
        &self.attrs
    }

    /// Returns the attribute named `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Returns the attribute named `key` as an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Returns the attribute named `key` as a string slice.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns `true` if the attribute `key` is present (even if `null`).
    pub fn contains(&self, key: &str) -> bool {
        self.attrs.get(key).is_some()
    }

    /// Sets the attribute `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(map) = &mut self.attrs {
            map.insert(key.into(), value.into());
        }
    }

    /// Removes and returns the attribute `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match &mut self.attrs {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind.name)
            .field("attrs", &self.attrs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static NOTICE: EventKind = EventKind::new("notice", &kinds::EVENT);
    static POKE: EventKind = EventKind::new("notice.poke", &NOTICE);

    #[test]
    fn chain_runs_root_to_leaf() {
        let names: Vec<_> = POKE.chain().iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["event", "notice", "notice.poke"]);
        assert_eq!(kinds::EVENT.chain().len(), 1);
    }

    #[test]
    fn identity_is_by_declaration() {
        static SHADOW: EventKind = EventKind::new("notice", &kinds::EVENT);
        assert_eq!(&NOTICE, &NOTICE);
        assert_ne!(&NOTICE, &SHADOW);
    }

    #[test]
    fn is_a_follows_ancestry() {
        assert!(POKE.is_a(&NOTICE));
        assert!(POKE.is_a(&kinds::EVENT));
        assert!(!NOTICE.is_a(&POKE));
        assert!(!kinds::GROUP_MESSAGE.is_a(&kinds::PRIVATE_MESSAGE));
    }

    #[test]
    fn attribute_access() {
        let mut event = Event::group_message(7, 42, "hi");
        assert!(event.is(&kinds::MESSAGE));
        assert_eq!(event.get_i64("group_id"), Some(7));
        assert_eq!(event.get_str("message_type"), Some("group"));

        event.set("user_id", 43);
        assert_eq!(event.get("user_id"), Some(&json!(43)));
        assert_eq!(event.remove("group_id"), Some(json!(7)));
        assert!(!event.contains("group_id"));
    }
}
