//! Built-in methods on values.

use std::rc::Rc;

use super::eval::make_iter;
use crate::exception::Exception;
use crate::value::{ListObject, Value};

fn attribute_error(receiver: &Value, method: &str) -> Exception {
    Exception::new(
        "AttributeError",
        format!("{} has no method named `{}`", receiver.type_name(), method),
    )
}

fn expect_args(receiver: &Value, method: &str, args: &[Value], count: usize) -> Result<(), Exception> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Exception::type_error(format!(
            "{}.{}() takes {} arguments but {} were given",
            receiver.type_name(),
            method,
            count,
            args.len()
        )))
    }
}

fn to_i64(n: usize) -> Result<i64, Exception> {
    i64::try_from(n).map_err(|_| Exception::new("OverflowError", "length does not fit in int"))
}

/// Length of a sized value, as used by `len(x)` and `.len()`.
pub(super) fn length(value: &Value) -> Result<i64, Exception> {
    match value {
        Value::List(list) => to_i64(list.len()),
        Value::Str(s) => to_i64(s.chars().count()),
        Value::Tuple(items) => to_i64(items.len()),
        Value::Range(range) => range
            .end_exclusive()
            .checked_sub(range.start)
            .map(|n| n.max(0))
            .ok_or_else(|| Exception::new("OverflowError", "range length does not fit in int")),
        other => Err(Exception::type_error(format!("{} has no len()", other.type_name()))),
    }
}

/// Call `receiver.method(args..)`.
pub(super) fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value, Exception> {
    // Methods every value shares.
    match method {
        "clone" if !matches!(receiver, Value::List(_)) => {
            expect_args(receiver, method, &args, 0)?;
            return Ok(receiver.clone());
        }
        "to_string" => {
            expect_args(receiver, method, &args, 0)?;
            return Ok(Value::str(receiver.to_string()));
        }
        _ => {}
    }

    match receiver {
        Value::List(list) => list_method(receiver, list, method, args),
        Value::Str(s) => str_method(receiver, s, method, args),
        Value::Int(n) => int_method(receiver, *n, method, args),
        Value::Float(x) => float_method(receiver, *x, method, args),
        Value::Range(range) => match method {
            "len" => {
                expect_args(receiver, method, &args, 0)?;
                length(receiver).map(Value::Int)
            }
            "contains" => {
                expect_args(receiver, method, &args, 1)?;
                let hit = matches!(args[0], Value::Int(n) if n >= range.start && n < range.end_exclusive());
                Ok(Value::Bool(hit))
            }
            "iter" | "into_iter" => {
                expect_args(receiver, method, &args, 0)?;
                Ok(Value::Iter(make_iter(receiver)?))
            }
            _ => Err(attribute_error(receiver, method)),
        },
        Value::Iter(iter) => match method {
            "next" => {
                expect_args(receiver, method, &args, 0)?;
                iter.advance().ok_or_else(|| Exception::new("StopIteration", ""))
            }
            "collect" => {
                expect_args(receiver, method, &args, 0)?;
                let mut items = Vec::new();
                while let Some(item) = iter.advance() {
                    items.push(item);
                }
                Ok(Value::list(items))
            }
            "iter" | "into_iter" => Ok(receiver.clone()),
            _ => Err(attribute_error(receiver, method)),
        },
        _ => Err(attribute_error(receiver, method)),
    }
}

fn list_method(receiver: &Value, list: &Rc<ListObject>, method: &str, args: Vec<Value>) -> Result<Value, Exception> {
    match method {
        "push" => {
            expect_args(receiver, method, &args, 1)?;
            list.items_mut().extend(args);
            Ok(Value::Unit)
        }
        "pop" => {
            expect_args(receiver, method, &args, 0)?;
            list.items_mut()
                .pop()
                .ok_or_else(|| Exception::index_error("pop from empty list"))
        }
        "len" => {
            expect_args(receiver, method, &args, 0)?;
            to_i64(list.len()).map(Value::Int)
        }
        "is_empty" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::Bool(list.is_empty()))
        }
        "clone" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::list(list.items().clone()))
        }
        "contains" => {
            expect_args(receiver, method, &args, 1)?;
            Ok(Value::Bool(list.items().contains(&args[0])))
        }
        "first" | "last" => {
            expect_args(receiver, method, &args, 0)?;
            let items = list.items();
            let item = if method == "first" { items.first() } else { items.last() };
            item.cloned()
                .ok_or_else(|| Exception::index_error(format!("{}() on empty list", method)))
        }
        "insert" => {
            expect_args(receiver, method, &args, 2)?;
            let mut args = args.into_iter();
            let (Some(Value::Int(index)), Some(value)) = (args.next(), args.next()) else {
                return Err(Exception::type_error("insert index must be int"));
            };
            let mut items = list.items_mut();
            let index = usize::try_from(index)
                .ok()
                .filter(|&i| i <= items.len())
                .ok_or_else(|| {
                    Exception::index_error(format!(
                        "insertion index (is {}) should be <= len (is {})",
                        index,
                        items.len()
                    ))
                })?;
            items.insert(index, value);
            Ok(Value::Unit)
        }
        "remove" => {
            expect_args(receiver, method, &args, 1)?;
            let Value::Int(index) = args[0] else {
                return Err(Exception::type_error("remove index must be int"));
            };
            let mut items = list.items_mut();
            let len = items.len();
            let index = usize::try_from(index)
                .ok()
                .filter(|&i| i < len)
                .ok_or_else(|| {
                    Exception::index_error(format!(
                        "removal index (is {}) should be < len (is {})",
                        index, len
                    ))
                })?;
            Ok(items.remove(index))
        }
        "extend" => {
            expect_args(receiver, method, &args, 1)?;
            // Drain the source first; it may be this very list.
            let iter = make_iter(&args[0])?;
            let mut incoming = Vec::new();
            while let Some(item) = iter.advance() {
                incoming.push(item);
            }
            list.items_mut().extend(incoming);
            Ok(Value::Unit)
        }
        "iter" | "into_iter" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::Iter(make_iter(receiver)?))
        }
        _ => Err(attribute_error(receiver, method)),
    }
}

fn str_method(receiver: &Value, s: &str, method: &str, args: Vec<Value>) -> Result<Value, Exception> {
    match method {
        "len" => {
            expect_args(receiver, method, &args, 0)?;
            length(receiver).map(Value::Int)
        }
        "is_empty" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::Bool(s.is_empty()))
        }
        "to_uppercase" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "to_lowercase" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "trim" => {
            expect_args(receiver, method, &args, 0)?;
            Ok(Value::str(s.trim()))
        }
        "contains" => {
            expect_args(receiver, method, &args, 1)?;
            match &args[0] {
                Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_ref()))),
                other => Err(Exception::type_error(format!(
                    "str.contains() expects str, found {}",
                    other.type_name()
                ))),
            }
        }
        _ => Err(attribute_error(receiver, method)),
    }
}

fn int_method(receiver: &Value, n: i64, method: &str, args: Vec<Value>) -> Result<Value, Exception> {
    match (method, args.as_slice()) {
        ("abs", []) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Exception::new("OverflowError", "attempt to take abs with overflow")),
        ("pow", [Value::Int(exp)]) => u32::try_from(*exp)
            .ok()
            .and_then(|exp| n.checked_pow(exp))
            .map(Value::Int)
            .ok_or_else(|| Exception::new("OverflowError", "attempt to compute pow with overflow")),
        ("min", [Value::Int(other)]) => Ok(Value::Int(n.min(*other))),
        ("max", [Value::Int(other)]) => Ok(Value::Int(n.max(*other))),
        ("abs" | "pow" | "min" | "max", _) => Err(Exception::type_error(format!(
            "invalid arguments to int.{}()",
            method
        ))),
        _ => Err(attribute_error(receiver, method)),
    }
}

fn float_method(receiver: &Value, x: f64, method: &str, args: Vec<Value>) -> Result<Value, Exception> {
    let as_float = |v: &Value| match v {
        Value::Float(f) => Some(*f),
        Value::Int(n) => Some(*n as f64),
        _ => None,
    };
    match (method, args.as_slice()) {
        ("abs", []) => Ok(Value::Float(x.abs())),
        ("sqrt", []) => Ok(Value::Float(x.sqrt())),
        ("floor", []) => Ok(Value::Float(x.floor())),
        ("round", []) => Ok(Value::Float(x.round())),
        ("powi", [Value::Int(exp)]) => i32::try_from(*exp)
            .map(|exp| Value::Float(x.powi(exp)))
            .map_err(|_| Exception::new("OverflowError", "exponent out of range")),
        ("min", [other]) if as_float(other).is_some() => {
            Ok(Value::Float(x.min(as_float(other).unwrap_or(x))))
        }
        ("max", [other]) if as_float(other).is_some() => {
            Ok(Value::Float(x.max(as_float(other).unwrap_or(x))))
        }
        ("abs" | "sqrt" | "floor" | "round" | "powi" | "min" | "max", _) => Err(Exception::type_error(
            format!("invalid arguments to float.{}()", method),
        )),
        _ => Err(attribute_error(receiver, method)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_push_pop() {
        let list = Value::list(vec![]);
        call_method(&list, "push", vec![Value::Int(1)]).unwrap();
        call_method(&list, "push", vec![Value::Int(2)]).unwrap();
        assert_eq!(call_method(&list, "len", vec![]).unwrap(), Value::Int(2));
        assert_eq!(call_method(&list, "pop", vec![]).unwrap(), Value::Int(2));
        assert_eq!(list, Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn test_list_clone_is_a_new_list() {
        let list = Value::list(vec![Value::Int(1)]);
        let copy = call_method(&list, "clone", vec![]).unwrap();
        assert_ne!(list.object_id(), copy.object_id());
        call_method(&copy, "push", vec![Value::Int(2)]).unwrap();
        assert_eq!(length(&list).unwrap(), 1);
    }

    #[test]
    fn test_range_length() {
        let range = |start, end| {
            Value::Range(crate::value::RangeValue {
                start,
                end,
                inclusive: false,
            })
        };
        assert_eq!(length(&range(2, 5)).unwrap(), 3);
        assert_eq!(length(&range(5, 2)).unwrap(), 0);
        assert_eq!(length(&range(i64::MIN, i64::MAX)).unwrap_err().kind(), "OverflowError");
        assert_eq!(length(&range(-1, i64::MAX)).unwrap_err().kind(), "OverflowError");
    }

    #[test]
    fn test_extend_with_itself() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        call_method(&list, "extend", vec![list.clone()]).unwrap();
        assert_eq!(length(&list).unwrap(), 4);
    }

    #[test]
    fn test_pop_empty() {
        let err = call_method(&Value::list(vec![]), "pop", vec![]).unwrap_err();
        assert_eq!(err.kind(), "IndexError");
    }

    #[test]
    fn test_iterator_next_and_stop() {
        let range = Value::Range(crate::value::RangeValue { start: 0, end: 1, inclusive: false });
        let iter = call_method(&range, "iter", vec![]).unwrap();
        assert_eq!(call_method(&iter, "next", vec![]).unwrap(), Value::Int(0));
        assert_eq!(call_method(&iter, "next", vec![]).unwrap_err().kind(), "StopIteration");
    }

    #[test]
    fn test_unknown_method() {
        let err = call_method(&Value::Int(1), "frobnicate", vec![]).unwrap_err();
        assert_eq!(err.kind(), "AttributeError");
    }

    #[test]
    fn test_str_methods() {
        let s = Value::str("Hi");
        assert_eq!(call_method(&s, "to_uppercase", vec![]).unwrap(), Value::str("HI"));
        assert_eq!(call_method(&s, "len", vec![]).unwrap(), Value::Int(2));
        assert_eq!(call_method(&Value::Int(-3), "abs", vec![]).unwrap(), Value::Int(3));
    }
}
