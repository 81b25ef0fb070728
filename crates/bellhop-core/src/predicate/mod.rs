//! Predicate compiler.
//!
//! A [`Spec`] is a declarative description of the shape a value must have.
//! [`compile`] turns it into a [`Predicate`]: a cheap-to-clone, thread-safe
//! boolean function over [`serde_json::Value`] that can be reused by any
//! number of handlers.
//!
//! # Absence
//!
//! [`Spec::Absent`] (built with [`absent`]) marks an attribute that must be
//! missing. Compiling it yields an *absent* predicate, which the enclosing
//! attribute or mapping spec interprets; tested on its own it is always
//! `false`. Combinators propagate absence:
//!
//! | Combination | Result |
//! |---|---|
//! | `and` of only absent | absent |
//! | `and` of absent and concrete | always `false` |
//! | `or` of only absent | absent |
//! | `or` of absent and concrete | optional: passes when missing |
//! | `not(absent)` | always `true` |
//!
//! # Example
//!
//! ```rust,ignore
//! use bellhop_core::predicate::{self, ValueKind, absent, attrs, compile, func};
//!
//! let adult = compile(attrs([
//!     ("age", func(|v| v.as_i64().is_some_and(|age| age >= 18))),
//!     ("banned", absent()),
//! ]));
//!
//! assert!(adult.test(&json!({ "age": 20 })));
//! assert!(!adult.test(&json!({ "age": 20, "banned": true })));
//! ```

mod set;
mod spec;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use spec::{SetSemantics, Spec, ValueKind};

/// A type-erased check over a JSON value.
pub type Check = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

// ============================================================================
// Predicate
// ============================================================================

/// A compiled, pure boolean function over structured values.
#[derive(Clone)]
pub struct Predicate {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Absent,
    Optional(Check),
    Required(Check),
}

impl Predicate {
    fn required(check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            repr: Repr::Required(Arc::new(check)),
        }
    }

    fn absent() -> Self {
        Self { repr: Repr::Absent }
    }

    /// A predicate that accepts everything.
    pub fn always() -> Self {
        Self::required(|_| true)
    }

    /// A predicate that rejects everything.
    pub fn never() -> Self {
        Self::required(|_| false)
    }

    /// Wraps a function as a predicate.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::required(f)
    }

    /// Evaluates the predicate. Absent predicates never pass on their own.
    pub fn test(&self, value: &Value) -> bool {
        match &self.repr {
            Repr::Absent => false,
            Repr::Optional(check) | Repr::Required(check) => check(value),
        }
    }

    /// Returns `true` if this predicate demands that the attribute be missing.
    pub fn is_absent(&self) -> bool {
        matches!(self.repr, Repr::Absent)
    }

    /// Returns `true` if this predicate also accepts a missing attribute.
    pub fn is_optional(&self) -> bool {
        matches!(self.repr, Repr::Optional(_))
    }

    /// How a missing or present attribute is judged inside `Attrs`/`Mapping`.
    fn field(&self, value: Option<&Value>) -> bool {
        match (&self.repr, value) {
            (Repr::Absent, value) => value.is_none(),
            (Repr::Optional(_), None) => true,
            (Repr::Required(_), None) => false,
            (Repr::Optional(check) | Repr::Required(check), Some(value)) => check(value),
        }
    }

    /// The underlying check of a concrete predicate.
    fn check(&self) -> Option<&Check> {
        match &self.repr {
            Repr::Absent => None,
            Repr::Optional(check) | Repr::Required(check) => Some(check),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.repr {
            Repr::Absent => "absent",
            Repr::Optional(_) => "optional",
            Repr::Required(_) => "required",
        };
        write!(f, "Predicate({state})")
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compiles a spec into a reusable predicate.
pub fn compile(spec: impl Into<Spec>) -> Predicate {
    compile_spec(spec.into())
}

fn compile_spec(spec: Spec) -> Predicate {
    match spec {
        Spec::Absent => Predicate::absent(),
        Spec::Attrs(fields) => {
            let fields = compile_fields(fields);
            Predicate::required(move |target| {
                fields
                    .iter()
                    .all(|(key, predicate)| predicate.field(target.get(key.as_str())))
            })
        }
        Spec::Mapping(fields) => {
            let fields = compile_fields(fields);
            Predicate::required(move |target| {
                let Some(map) = target.as_object() else {
                    return false;
                };
                fields
                    .iter()
                    .all(|(key, predicate)| predicate.field(map.get(key)))
            })
        }
        Spec::Subsequence(items) => {
            let checks = compile_elements(items);
            Predicate::required(move |target| {
                let Some(elements) = target.as_array() else {
                    return false;
                };
                if elements.len() < checks.len() {
                    return false;
                }
                let mut remaining = elements.iter();
                checks
                    .iter()
                    .all(|check| remaining.any(|element| check(element)))
            })
        }
        Spec::Prefix(items) => {
            let checks = compile_elements(items);
            Predicate::required(move |target| {
                let Some(elements) = target.as_array() else {
                    return false;
                };
                elements.len() >= checks.len()
                    && checks
                        .iter()
                        .zip(elements)
                        .all(|(check, element)| check(element))
            })
        }
        Spec::Set { items, semantics } => {
            let checks = compile_elements(items);
            Predicate::required(move |target| {
                let Some(elements) = target.as_array() else {
                    return false;
                };
                match semantics {
                    SetSemantics::Exclusive => set::exclusive(&checks, elements),
                    SetSemantics::Covering => set::covering(&checks, elements),
                }
            })
        }
        Spec::Kind(kind) => Predicate::required(move |target| kind.matches(target)),
        Spec::Literal(expected) => Predicate::required(move |target| *target == expected),
        Spec::Func(check) => Predicate {
            repr: Repr::Required(check),
        },
        Spec::And(items) => compile_and(items),
        Spec::Or(items) => compile_or(items),
        Spec::Not(inner) => {
            let inner = compile_spec(*inner);
            match inner.check().cloned() {
                None => Predicate::always(),
                Some(check) => Predicate::required(move |target| !check(target)),
            }
        }
        Spec::ForAll(inner) => {
            let inner = compile_spec(*inner);
            Predicate::required(move |target| {
                target
                    .as_array()
                    .is_some_and(|elements| elements.iter().all(|element| inner.test(element)))
            })
        }
        Spec::Exist(inner) => {
            let inner = compile_spec(*inner);
            Predicate::required(move |target| {
                target
                    .as_array()
                    .is_some_and(|elements| elements.iter().any(|element| inner.test(element)))
            })
        }
        Spec::Compiled(predicate) => predicate,
    }
}

fn compile_fields(fields: Vec<(String, Spec)>) -> Vec<(String, Predicate)> {
    fields
        .into_iter()
        .map(|(key, spec)| (key, compile_spec(spec)))
        .collect()
}

/// Positional and set forms ignore absent and optional entries.
fn compile_elements(items: Vec<Spec>) -> Vec<Check> {
    items
        .into_iter()
        .map(compile_spec)
        .filter_map(|predicate| match predicate.repr {
            Repr::Required(check) => Some(check),
            Repr::Absent | Repr::Optional(_) => None,
        })
        .collect()
}

fn compile_and(items: Vec<Spec>) -> Predicate {
    let predicates: Vec<Predicate> = items.into_iter().map(compile_spec).collect();
    let absent = predicates.iter().filter(|p| p.is_absent()).count();
    if absent > 0 {
        return if absent == predicates.len() {
            Predicate::absent()
        } else {
            Predicate::never()
        };
    }
    Predicate::required(move |target| predicates.iter().all(|p| p.test(target)))
}

fn compile_or(items: Vec<Spec>) -> Predicate {
    let predicates: Vec<Predicate> = items.into_iter().map(compile_spec).collect();
    let absent = predicates.iter().filter(|p| p.is_absent()).count();
    if absent > 0 && absent == predicates.len() {
        return Predicate::absent();
    }
    let checks: Vec<Check> = predicates.iter().filter_map(|p| p.check().cloned()).collect();
    let check: Check = Arc::new(move |target: &Value| checks.iter().any(|check| check(target)));
    let repr = if absent > 0 {
        Repr::Optional(check)
    } else {
        Repr::Required(check)
    };
    Predicate { repr }
}

// ============================================================================
// Spec Builders
// ============================================================================

/// The attribute must be missing.
pub fn absent() -> Spec {
    Spec::Absent
}

/// The attribute may be missing; if present it must satisfy `spec`.
pub fn optional(spec: impl Into<Spec>) -> Spec {
    Spec::Or(vec![Spec::Absent, spec.into()])
}

/// Named attributes of the target.
pub fn attrs<K, S>(fields: impl IntoIterator<Item = (K, S)>) -> Spec
where
    K: Into<String>,
    S: Into<Spec>,
{
    Spec::Attrs(
        fields
            .into_iter()
            .map(|(key, spec)| (key.into(), spec.into()))
            .collect(),
    )
}

/// Keys of a target that must be an object.
pub fn mapping<K, S>(fields: impl IntoIterator<Item = (K, S)>) -> Spec
where
    K: Into<String>,
    S: Into<Spec>,
{
    Spec::Mapping(
        fields
            .into_iter()
            .map(|(key, spec)| (key.into(), spec.into()))
            .collect(),
    )
}

/// Ordered, not necessarily contiguous, elements.
pub fn subsequence<S: Into<Spec>>(items: impl IntoIterator<Item = S>) -> Spec {
    Spec::Subsequence(items.into_iter().map(Into::into).collect())
}

/// Leading elements, matched positionally.
pub fn prefix<S: Into<Spec>>(items: impl IntoIterator<Item = S>) -> Spec {
    Spec::Prefix(items.into_iter().map(Into::into).collect())
}

/// Unordered elements with exclusive binding.
pub fn set<S: Into<Spec>>(items: impl IntoIterator<Item = S>) -> Spec {
    set_with(items, SetSemantics::Exclusive)
}

/// Unordered elements with the given binding semantics.
pub fn set_with<S: Into<Spec>>(items: impl IntoIterator<Item = S>, semantics: SetSemantics) -> Spec {
    Spec::Set {
        items: items.into_iter().map(Into::into).collect(),
        semantics,
    }
}

/// Runtime kind check.
pub fn kind(kind: ValueKind) -> Spec {
    Spec::Kind(kind)
}

/// Equality check.
pub fn eq(value: impl Into<Value>) -> Spec {
    Spec::Literal(value.into())
}

/// Direct predicate function.
pub fn func<F>(f: F) -> Spec
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Spec::func(f)
}

/// All of `items` must pass.
pub fn and<S: Into<Spec>>(items: impl IntoIterator<Item = S>) -> Spec {
    Spec::And(items.into_iter().map(Into::into).collect())
}

/// At least one of `items` must pass.
pub fn or<S: Into<Spec>>(items: impl IntoIterator<Item = S>) -> Spec {
    Spec::Or(items.into_iter().map(Into::into).collect())
}

/// `spec` must fail.
pub fn not(spec: impl Into<Spec>) -> Spec {
    Spec::Not(Box::new(spec.into()))
}

/// Every element must satisfy `spec`.
pub fn for_all(spec: impl Into<Spec>) -> Spec {
    Spec::ForAll(Box::new(spec.into()))
}

/// Some element must satisfy `spec`.
pub fn exist(spec: impl Into<Spec>) -> Spec {
    Spec::Exist(Box::new(spec.into()))
}
