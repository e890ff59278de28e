//! Runtime values.
//!
//! Scalars, text, tuples, ranges and function references are immutable and
//! cheap to clone. Lists, iterators and handles are heap objects shared by
//! reference and carry an [`ObjectId`] so observers can tell instances apart.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a heap object (list, iterator, handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

/// Identity of a function's code within a loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CodeId(pub(crate) usize);

impl CodeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code_{}", self.0)
    }
}

/// A mutable list shared by reference.
#[derive(Debug)]
pub struct ListObject {
    id: ObjectId,
    items: RefCell<Vec<Value>>,
}

impl ListObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Borrow the items.
    ///
    /// Panics if the list is currently being mutated; use
    /// [`try_items`](Self::try_items) when that can happen.
    pub fn items(&self) -> std::cell::Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    pub fn try_items(&self) -> Result<std::cell::Ref<'_, Vec<Value>>, std::cell::BorrowError> {
        self.items.try_borrow()
    }

    pub fn items_mut(&self) -> std::cell::RefMut<'_, Vec<Value>> {
        self.items.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Cursor state of a live iterator.
#[derive(Debug)]
pub(crate) enum IterState {
    Range { next: i64, end: i64 },
    List { list: Rc<ListObject>, index: usize },
}

/// A live iterator. Consuming it advances shared state.
#[derive(Debug)]
pub struct IterObject {
    id: ObjectId,
    state: RefCell<IterState>,
}

impl IterObject {
    pub(crate) fn new(state: IterState) -> Self {
        Self {
            id: ObjectId::next(),
            state: RefCell::new(state),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Advance the iterator.
    pub fn advance(&self) -> Option<Value> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            IterState::Range { next, end } => {
                if *next < *end {
                    let value = Value::Int(*next);
                    *next += 1;
                    Some(value)
                } else {
                    None
                }
            }
            IterState::List { list, index } => {
                let item = list.items().get(*index).cloned();
                if item.is_some() {
                    *index += 1;
                }
                item
            }
        }
    }
}

/// An opaque external resource, such as an open file.
#[derive(Debug)]
pub struct HandleObject {
    id: ObjectId,
    kind: String,
    label: String,
}

impl HandleObject {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: ObjectId::next(),
            kind: kind.into(),
            label: label.into(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A range value (`start..end` or `start..=end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeValue {
    pub start: i64,
    pub end: i64,
    pub inclusive: bool,
}

impl RangeValue {
    /// Exclusive upper bound, saturating for `..=i64::MAX`.
    pub fn end_exclusive(&self) -> i64 {
        if self.inclusive {
            self.end.saturating_add(1)
        } else {
            self.end
        }
    }
}

/// Reference to a script function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub code: CodeId,
    pub name: Rc<str>,
}

/// A script value.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    Range(RangeValue),
    Function(FunctionRef),
    List(Rc<ListObject>),
    Iter(Rc<IterObject>),
    Handle(Rc<HandleObject>),
}

impl Value {
    /// Build a new list with a fresh identity.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(ListObject {
            id: ObjectId::next(),
            items: RefCell::new(items),
        }))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(items.into())
    }

    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn handle(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Value::Handle(Rc::new(HandleObject::new(kind, label)))
    }

    /// Short type name used in messages and placeholders.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::List(_) => "list",
            Value::Iter(_) => "iterator",
            Value::Handle(_) => "handle",
        }
    }

    /// Identity of heap-allocated values.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::List(list) => Some(list.id),
            Value::Iter(iter) => Some(iter.id),
            Value::Handle(handle) => Some(handle.id),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Rc<ListObject>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, debug: bool, seen: &mut Vec<ObjectId>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) if debug => write!(f, "{:?}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) if debug => write!(f, "{:?}", s),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write(f, true, seen)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Range(r) => {
                let op = if r.inclusive { "..=" } else { ".." };
                write!(f, "{}{}{}", r.start, op, r.end)
            }
            Value::Function(func) => write!(f, "fn {}", func.name),
            Value::List(list) => {
                if seen.contains(&list.id) {
                    return f.write_str("[...]");
                }
                let Ok(items) = list.try_items() else {
                    return f.write_str("[<borrowed>]");
                };
                seen.push(list.id);
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write(f, true, seen)?;
                }
                seen.pop();
                f.write_str("]")
            }
            Value::Iter(iter) => write!(f, "<iterator {}>", iter.id),
            Value::Handle(handle) => write!(f, "<{} {}>", handle.kind, handle.label),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true, &mut Vec::new())
    }
}

impl Value {
    /// Structural equality that tolerates self-referencing lists.
    ///
    /// A pair of lists already under comparison is taken as equal, so two
    /// lists that contain each other compare equal instead of recursing forever.
    fn eq_tracked(&self, other: &Self, seen: &mut Vec<(ObjectId, ObjectId)>) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_tracked(y, seen))
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.code == b.code,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) || seen.contains(&(a.id, b.id)) {
                    return true;
                }
                seen.push((a.id, b.id));
                let (left, right) = (a.items(), b.items());
                left.len() == right.len() && left.iter().zip(right.iter()).all(|(x, y)| x.eq_tracked(y, seen))
            }
            (Value::Iter(a), Value::Iter(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_tracked(other, &mut Vec::new())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

/// Serializes a value while tracking the lists currently being written.
struct Tracked<'a> {
    value: &'a Value,
    seen: &'a RefCell<Vec<ObjectId>>,
}

impl Serialize for Tracked<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Unit => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&Tracked { value: item, seen: self.seen })?;
                }
                seq.end()
            }
            Value::Range(r) => r.serialize(serializer),
            Value::Function(func) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("function", &*func.name)?;
                map.end()
            }
            Value::List(list) => {
                if self.seen.borrow().contains(&list.id) {
                    return serializer.serialize_str("[...]");
                }
                let Ok(items) = list.try_items() else {
                    return serializer.serialize_str("[<borrowed>]");
                };
                self.seen.borrow_mut().push(list.id);
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&Tracked { value: item, seen: self.seen })?;
                }
                self.seen.borrow_mut().pop();
                seq.end()
            }
            Value::Iter(iter) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("iterator", &iter.id)?;
                map.end()
            }
            Value::Handle(handle) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("handle", &handle.kind)?;
                map.serialize_entry("label", &handle.label)?;
                map.serialize_entry("id", &handle.id)?;
                map.end()
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let seen = RefCell::new(Vec::new());
        Tracked { value: self, seen: &seen }.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ids_are_unique() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        assert_ne!(a.object_id(), b.object_id());
        assert_eq!(Value::Int(1).object_id(), None);
    }

    #[test]
    fn test_display_and_debug() {
        let value = Value::tuple(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(value.to_string(), "(1, \"a\")");
        assert_eq!(Value::str("a").to_string(), "a");
        assert_eq!(format!("{:?}", Value::str("a")), "\"a\"");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::list(vec![Value::Int(1), Value::Int(2)]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_cyclic_list_display_terminates() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(obj) = &list {
            obj.items_mut().push(list.clone());
        }
        assert_eq!(list.to_string(), "[1, [...]]");
        assert_eq!(serde_json::to_string(&list).unwrap(), "[1,\"[...]\"]");
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::str("2"));
    }

    #[test]
    fn test_list_equality_by_contents() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutually_nested_lists_compare_equal() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        if let (Value::List(x), Value::List(y)) = (&a, &b) {
            x.items_mut().push(b.clone());
            y.items_mut().push(a.clone());
        }
        assert_eq!(a, b);

        let c = Value::list(vec![Value::Int(1)]);
        if let Value::List(z) = &c {
            z.items_mut().push(c.clone());
        }
        assert_ne!(a, c);
        assert_eq!(Value::tuple(vec![a.clone()]), Value::tuple(vec![b.clone()]));
    }

    #[test]
    fn test_iterator_advances_shared_state() {
        let iter = IterObject::new(IterState::Range { next: 0, end: 2 });
        assert_eq!(iter.advance(), Some(Value::Int(0)));
        assert_eq!(iter.advance(), Some(Value::Int(1)));
        assert_eq!(iter.advance(), None);
    }

    #[test]
    fn test_serialize_scalars_and_handles() {
        assert_eq!(serde_json::to_string(&Value::Unit).unwrap(), "null");
        let handle = Value::handle("file", "data.txt");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["handle"], "file");
        assert_eq!(json["label"], "data.txt");
    }
}
