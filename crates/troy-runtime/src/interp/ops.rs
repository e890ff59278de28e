//! Operators.
//!
//! Integer arithmetic is checked: overflow raises `OverflowError` and a zero
//! divisor raises `ZeroDivisionError`. Mixed int/float operands promote to
//! float.

use std::cmp::Ordering;

use syn::BinOp;

use super::eval::render;
use crate::exception::Exception;
use crate::value::Value;

/// Arithmetic and bitwise operators, shared by `a op b` and `a op= b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl Arith {
    fn plain(op: &BinOp) -> Option<Self> {
        Some(match op {
            BinOp::Add(_) => Arith::Add,
            BinOp::Sub(_) => Arith::Sub,
            BinOp::Mul(_) => Arith::Mul,
            BinOp::Div(_) => Arith::Div,
            BinOp::Rem(_) => Arith::Rem,
            BinOp::BitAnd(_) => Arith::BitAnd,
            BinOp::BitOr(_) => Arith::BitOr,
            BinOp::BitXor(_) => Arith::BitXor,
            BinOp::Shl(_) => Arith::Shl,
            BinOp::Shr(_) => Arith::Shr,
            _ => return None,
        })
    }

    /// The operator behind a compound assignment such as `+=`.
    pub(super) fn compound(op: &BinOp) -> Option<Self> {
        Some(match op {
            BinOp::AddAssign(_) => Arith::Add,
            BinOp::SubAssign(_) => Arith::Sub,
            BinOp::MulAssign(_) => Arith::Mul,
            BinOp::DivAssign(_) => Arith::Div,
            BinOp::RemAssign(_) => Arith::Rem,
            BinOp::BitAndAssign(_) => Arith::BitAnd,
            BinOp::BitOrAssign(_) => Arith::BitOr,
            BinOp::BitXorAssign(_) => Arith::BitXor,
            BinOp::ShlAssign(_) => Arith::Shl,
            BinOp::ShrAssign(_) => Arith::Shr,
            _ => return None,
        })
    }

    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
            Arith::Rem => "%",
            Arith::BitAnd => "&",
            Arith::BitOr => "|",
            Arith::BitXor => "^",
            Arith::Shl => "<<",
            Arith::Shr => ">>",
        }
    }
}

/// Evaluate a non-short-circuit binary operator.
pub(super) fn binary(op: &BinOp, lhs: Value, rhs: Value) -> Result<Value, Exception> {
    if let Some(arith) = Arith::plain(op) {
        return self::arith(arith, lhs, rhs);
    }
    match op {
        BinOp::Eq(_) => Ok(Value::Bool(lhs == rhs)),
        BinOp::Ne(_) => Ok(Value::Bool(lhs != rhs)),
        BinOp::Lt(_) => compare(&lhs, &rhs, op).map(|o| Value::Bool(o == Some(Ordering::Less))),
        BinOp::Le(_) => compare(&lhs, &rhs, op)
            .map(|o| Value::Bool(matches!(o, Some(Ordering::Less | Ordering::Equal)))),
        BinOp::Gt(_) => compare(&lhs, &rhs, op).map(|o| Value::Bool(o == Some(Ordering::Greater))),
        BinOp::Ge(_) => compare(&lhs, &rhs, op)
            .map(|o| Value::Bool(matches!(o, Some(Ordering::Greater | Ordering::Equal)))),
        other => Err(Exception::unsupported(format!("operator `{}`", render(other)))),
    }
}

/// `None` means unordered (NaN involved).
fn compare(lhs: &Value, rhs: &Value, op: &BinOp) -> Result<Option<Ordering>, Exception> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Float(a), Value::Float(b)) => Ok(a.partial_cmp(b)),
        (Value::Int(a), Value::Float(b)) => Ok((*a as f64).partial_cmp(b)),
        (Value::Float(a), Value::Int(b)) => Ok(a.partial_cmp(&(*b as f64))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        _ => Err(Exception::type_error(format!(
            "cannot compare {} {} {}",
            lhs.type_name(),
            render(op),
            rhs.type_name()
        ))),
    }
}

pub(super) fn arith(op: Arith, lhs: Value, rhs: Value) -> Result<Value, Exception> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, a, b).map(Value::Int),
        (Value::Float(a), Value::Float(b)) => float_arith(op, a, b),
        (Value::Int(a), Value::Float(b)) => float_arith(op, a as f64, b),
        (Value::Float(a), Value::Int(b)) => float_arith(op, a, b as f64),
        (Value::Str(a), Value::Str(b)) if op == Arith::Add => Ok(Value::str(format!("{}{}", a, b))),
        (Value::Bool(a), Value::Bool(b)) => match op {
            Arith::BitAnd => Ok(Value::Bool(a & b)),
            Arith::BitOr => Ok(Value::Bool(a | b)),
            Arith::BitXor => Ok(Value::Bool(a ^ b)),
            _ => Err(unsupported_operands(op, "bool", "bool")),
        },
        (lhs, rhs) => Err(unsupported_operands(op, lhs.type_name(), rhs.type_name())),
    }
}

fn int_arith(op: Arith, a: i64, b: i64) -> Result<i64, Exception> {
    let result = match op {
        Arith::Add => a.checked_add(b),
        Arith::Sub => a.checked_sub(b),
        Arith::Mul => a.checked_mul(b),
        Arith::Div => {
            if b == 0 {
                return Err(Exception::new("ZeroDivisionError", "attempt to divide by zero"));
            }
            a.checked_div(b)
        }
        Arith::Rem => {
            if b == 0 {
                return Err(Exception::new(
                    "ZeroDivisionError",
                    "attempt to calculate the remainder with a divisor of zero",
                ));
            }
            a.checked_rem(b)
        }
        Arith::BitAnd => Some(a & b),
        Arith::BitOr => Some(a | b),
        Arith::BitXor => Some(a ^ b),
        Arith::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)),
        Arith::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
    };
    result.ok_or_else(|| {
        Exception::new(
            "OverflowError",
            format!("attempt to compute `{} {} {}` with overflow", a, op.symbol(), b),
        )
    })
}

fn float_arith(op: Arith, a: f64, b: f64) -> Result<Value, Exception> {
    let result = match op {
        Arith::Add => a + b,
        Arith::Sub => a - b,
        Arith::Mul => a * b,
        Arith::Div => a / b,
        Arith::Rem => a % b,
        _ => return Err(unsupported_operands(op, "float", "float")),
    };
    Ok(Value::Float(result))
}

fn unsupported_operands(op: Arith, lhs: &str, rhs: &str) -> Exception {
    Exception::type_error(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        lhs,
        rhs
    ))
}

/// `value as ty` for the numeric types scripts use.
pub(super) fn cast(value: Value, ty: &str) -> Result<Value, Exception> {
    let is_int = matches!(
        ty,
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize"
    );
    let is_float = matches!(ty, "f32" | "f64");
    match value {
        Value::Int(n) if is_int => Ok(Value::Int(n)),
        Value::Int(n) if is_float => Ok(Value::Float(n as f64)),
        Value::Float(x) if is_int => Ok(Value::Int(x as i64)),
        Value::Float(x) if is_float => Ok(Value::Float(x)),
        Value::Bool(b) if is_int => Ok(Value::Int(i64::from(b))),
        other => Err(Exception::type_error(format!(
            "cannot cast {} as {}",
            other.type_name(),
            ty
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_overflow_is_checked() {
        let err = arith(Arith::Mul, Value::Int(i64::MAX), Value::Int(2)).unwrap_err();
        assert_eq!(err.kind(), "OverflowError");
    }

    #[test]
    fn test_remainder_by_zero() {
        let err = arith(Arith::Rem, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind(), "ZeroDivisionError");
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        assert_eq!(arith(Arith::Add, Value::Int(1), Value::Float(0.5)).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            arith(Arith::Add, Value::str("ab"), Value::str("c")).unwrap(),
            Value::str("abc")
        );
        assert_eq!(
            arith(Arith::Sub, Value::str("ab"), Value::str("c")).unwrap_err().kind(),
            "TypeError"
        );
    }

    #[test]
    fn test_cast() {
        assert_eq!(cast(Value::Bool(true), "i64").unwrap(), Value::Int(1));
        assert_eq!(cast(Value::str("x"), "i64").unwrap_err().kind(), "TypeError");
    }
}
