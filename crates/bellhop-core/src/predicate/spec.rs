//! The declarative matcher language.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Check, Predicate};

/// Runtime kind of a JSON value, used by [`Spec::Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any number representable as `i64` or `u64`.
    Integer,
    /// A number that only fits `f64`.
    Float,
    /// Any number.
    Number,
    /// A string.
    String,
    /// An array.
    Array,
    /// An object.
    Object,
}

impl ValueKind {
    /// Returns `true` if `value` is of this kind.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// How [`Spec::Set`] binds sub-matchers to elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetSemantics {
    /// Every sub-matcher needs its own element: a perfect assignment of
    /// sub-matchers to distinct elements must exist.
    #[default]
    Exclusive,
    /// Every sub-matcher merely needs some satisfying element; elements may be
    /// shared between sub-matchers.
    Covering,
}

/// A matcher specification, compiled into a [`Predicate`] by
/// [`compile`](super::compile).
///
/// | Form | Passes when |
/// |---|---|
/// | `Absent` | the attribute or key holding it is missing |
/// | `Attrs` | every named attribute satisfies its sub-spec |
/// | `Mapping` | like `Attrs`, and the target is an object |
/// | `Subsequence` | sub-specs match elements at increasing positions |
/// | `Prefix` | the first `k` elements match positionally |
/// | `Set` | sub-specs can be assigned to elements (see [`SetSemantics`]) |
/// | `Kind` | the target has the given [`ValueKind`] |
/// | `Literal` | the target equals the value |
/// | `Func` | the function returns `true` |
#[derive(Clone)]
pub enum Spec {
    /// The attribute must be missing.
    Absent,
    /// Named attributes of the target.
    Attrs(Vec<(String, Spec)>),
    /// Keys of a target that must be an object.
    Mapping(Vec<(String, Spec)>),
    /// Ordered, not necessarily contiguous, elements of an array.
    Subsequence(Vec<Spec>),
    /// Leading elements of an array; trailing elements are ignored.
    Prefix(Vec<Spec>),
    /// Unordered elements of an array.
    Set {
        /// Sub-specs to bind.
        items: Vec<Spec>,
        /// Whether bindings must be exclusive.
        semantics: SetSemantics,
    },
    /// Runtime kind check.
    Kind(ValueKind),
    /// Equality check.
    Literal(Value),
    /// Direct predicate function.
    Func(Check),
    /// All sub-specs must pass.
    And(Vec<Spec>),
    /// At least one sub-spec must pass.
    Or(Vec<Spec>),
    /// The sub-spec must fail.
    Not(Box<Spec>),
    /// Every element of an array must pass.
    ForAll(Box<Spec>),
    /// Some element of an array must pass.
    Exist(Box<Spec>),
    /// An already compiled predicate.
    Compiled(Predicate),
}

impl Spec {
    /// Wraps a function as a spec.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Attrs(fields) => f.debug_tuple("Attrs").field(fields).finish(),
            Self::Mapping(fields) => f.debug_tuple("Mapping").field(fields).finish(),
            Self::Subsequence(items) => f.debug_tuple("Subsequence").field(items).finish(),
            Self::Prefix(items) => f.debug_tuple("Prefix").field(items).finish(),
            Self::Set { items, semantics } => f
                .debug_struct("Set")
                .field("items", items)
                .field("semantics", semantics)
                .finish(),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
            Self::And(items) => f.debug_tuple("And").field(items).finish(),
            Self::Or(items) => f.debug_tuple("Or").field(items).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::ForAll(inner) => f.debug_tuple("ForAll").field(inner).finish(),
            Self::Exist(inner) => f.debug_tuple("Exist").field(inner).finish(),
            Self::Compiled(predicate) => f.debug_tuple("Compiled").field(predicate).finish(),
        }
    }
}

impl From<Value> for Spec {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Spec {
    fn from(value: &str) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<String> for Spec {
    fn from(value: String) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<i64> for Spec {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<i32> for Spec {
    fn from(value: i32) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<bool> for Spec {
    fn from(value: bool) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<ValueKind> for Spec {
    fn from(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<Predicate> for Spec {
    fn from(predicate: Predicate) -> Self {
        Self::Compiled(predicate)
    }
}
