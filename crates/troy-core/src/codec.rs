//! Snapshot codec.
//!
//! Turns live bindings into values that are safe to keep after the
//! activation they came from has ended:
//!
//! | value                                  | captured as                     |
//! |----------------------------------------|---------------------------------|
//! | unit, bool, int, float, str, range, fn | retained as-is                  |
//! | tuple                                  | retained; nested objects shared |
//! | list                                   | shallow copy of its items       |
//! | iterator, handle                       | placeholder                     |
//!
//! The copy is shallow: mutating the original list after capture does not
//! change the snapshot, but lists nested inside it are the same objects.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use troy_runtime::{ObjectId, Value};

/// Why a binding was captured as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderReason {
    /// The value has no safe copy (live iterators, resource handles).
    Uncopyable,
    /// Reading the value failed at capture time.
    CaptureFailed(String),
}

/// Stand-in for a value the codec could not copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub type_name: &'static str,
    pub id: ObjectId,
    pub reason: PlaceholderReason,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.type_name, self.id)
    }
}

/// One captured binding.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    /// Immutable value kept directly.
    Retained(Value),
    /// Items of a list, copied at capture time.
    ShallowCopy { source: ObjectId, items: Vec<Value> },
    /// A value that could not be copied.
    Placeholder(Placeholder),
}

impl CapturedValue {
    /// Rebuild a value from the capture.
    ///
    /// A shallow copy becomes a new list with its own identity. Placeholders
    /// have no value.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            CapturedValue::Retained(value) => Some(value.clone()),
            CapturedValue::ShallowCopy { items, .. } => Some(Value::list(items.clone())),
            CapturedValue::Placeholder(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CapturedValue::Retained(value) => value.type_name(),
            CapturedValue::ShallowCopy { .. } => "list",
            CapturedValue::Placeholder(placeholder) => placeholder.type_name,
        }
    }

    pub fn placeholder(&self) -> Option<&Placeholder> {
        match self {
            CapturedValue::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, CapturedValue::Placeholder(_))
    }
}

impl Serialize for CapturedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CapturedValue::Retained(value) => value.serialize(serializer),
            CapturedValue::ShallowCopy { items, .. } => items.serialize(serializer),
            CapturedValue::Placeholder(placeholder) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("placeholder", placeholder.type_name)?;
                map.serialize_entry("id", &placeholder.id)?;
                map.serialize_entry("reason", &placeholder.reason)?;
                map.end()
            }
        }
    }
}

/// Captured bindings of one activation, in binding order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VariableSnapshot {
    bindings: IndexMap<String, CapturedValue>,
}

impl VariableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CapturedValue> {
        self.bindings.get(name)
    }

    /// The captured value of `name`, rebuilt with [`CapturedValue::to_value`].
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).and_then(CapturedValue::to_value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Variable names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CapturedValue)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn insert(&mut self, name: String, value: CapturedValue) {
        self.bindings.insert(name, value);
    }
}

impl<'a> IntoIterator for &'a VariableSnapshot {
    type Item = (&'a String, &'a CapturedValue);
    type IntoIter = indexmap::map::Iter<'a, String, CapturedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

/// Capture one binding.
///
/// Never runs script code and never fails: a value that cannot be read
/// becomes a placeholder.
pub fn capture_value(name: &str, value: &Value) -> CapturedValue {
    match value {
        Value::List(list) => match list.try_items() {
            Ok(items) => CapturedValue::ShallowCopy {
                source: list.id(),
                items: items.clone(),
            },
            Err(err) => {
                tracing::warn!("Could not capture `{}` ({}): {}", name, list.id(), err);
                CapturedValue::Placeholder(Placeholder {
                    type_name: "list",
                    id: list.id(),
                    reason: PlaceholderReason::CaptureFailed(err.to_string()),
                })
            }
        },
        Value::Iter(iter) => CapturedValue::Placeholder(Placeholder {
            type_name: "iterator",
            id: iter.id(),
            reason: PlaceholderReason::Uncopyable,
        }),
        Value::Handle(handle) => CapturedValue::Placeholder(Placeholder {
            type_name: "handle",
            id: handle.id(),
            reason: PlaceholderReason::Uncopyable,
        }),
        other => CapturedValue::Retained(other.clone()),
    }
}

/// Capture every binding of an activation.
pub fn capture_bindings(locals: &IndexMap<String, Value>) -> VariableSnapshot {
    let mut snapshot = VariableSnapshot::new();
    for (name, value) in locals {
        snapshot.insert(name.clone(), capture_value(name, value));
    }
    snapshot
}
