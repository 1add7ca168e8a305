use std::cmp::Ordering;

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueRepr};

pub enum CoerceResult {
    I64(i64, i64),
    F64(f64, f64),
}

/// A value that was converted into a number for arithmetic.
#[derive(Copy, Clone, Debug)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(val) => val as f64,
            Number::Float(val) => val,
        }
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Value {
        match value {
            Number::Int(val) => Value::from(val),
            Number::Float(val) => Value::from(val),
        }
    }
}

pub fn coerce(a: &Value, b: &Value) -> Option<CoerceResult> {
    match (&a.0, &b.0) {
        (ValueRepr::I64(a), ValueRepr::I64(b)) => Some(CoerceResult::I64(*a, *b)),
        (ValueRepr::F64(a), ValueRepr::F64(b)) => Some(CoerceResult::F64(*a, *b)),
        (ValueRepr::I64(a), ValueRepr::F64(b)) => Some(CoerceResult::F64(*a as f64, *b)),
        (ValueRepr::F64(a), ValueRepr::I64(b)) => Some(CoerceResult::F64(*a, *b as f64)),
        _ => None,
    }
}

fn coerce_numbers(a: Number, b: Number) -> CoerceResult {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => CoerceResult::I64(a, b),
        (a, b) => CoerceResult::F64(a.as_f64(), b.as_f64()),
    }
}

/// Converts a value into a number.
///
/// Nil counts as zero and strings are parsed after trimming.
pub fn to_number(value: &Value) -> Result<Number, Error> {
    match value.0 {
        ValueRepr::Undefined | ValueRepr::None => Ok(Number::Int(0)),
        ValueRepr::I64(val) => Ok(Number::Int(val)),
        ValueRepr::F64(val) => Ok(Number::Float(val)),
        ValueRepr::String(ref s) => {
            let s = s.trim();
            if let Ok(val) = s.parse::<i64>() {
                Ok(Number::Int(val))
            } else if let Ok(val) = s.parse::<f64>() {
                Ok(Number::Float(val))
            } else {
                Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not convert {s:?} to a number"),
                ))
            }
        }
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot use {} as a number", value.kind()),
        )),
    }
}

fn failed_op(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("unable to calculate {lhs} {op} {rhs}"),
    )
}

fn division_by_zero() -> Error {
    Error::new(ErrorKind::InvalidOperation, "divided by 0")
}

macro_rules! math_binop {
    ($name:ident, $int:ident, $float:tt) => {
        pub fn $name(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
            match coerce_numbers(ok!(to_number(lhs)), ok!(to_number(rhs))) {
                CoerceResult::I64(a, b) => match a.$int(b) {
                    Some(val) => Ok(Value::from(val)),
                    None => Err(failed_op(stringify!($float), lhs, rhs)),
                },
                CoerceResult::F64(a, b) => Ok(Value::from(a $float b)),
            }
        }
    }
}

math_binop!(add, checked_add, +);
math_binop!(sub, checked_sub, -);
math_binop!(mul, checked_mul, *);

/// Divides with floored semantics for integers.
pub fn div(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match coerce_numbers(ok!(to_number(lhs)), ok!(to_number(rhs))) {
        CoerceResult::I64(_, 0) => Err(division_by_zero()),
        CoerceResult::I64(a, b) => {
            let q = ok!(a.checked_div(b).ok_or_else(|| failed_op("/", lhs, rhs)));
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::from(q - 1))
            } else {
                Ok(Value::from(q))
            }
        }
        CoerceResult::F64(_, b) if b == 0.0 => Err(division_by_zero()),
        CoerceResult::F64(a, b) => Ok(Value::from(a / b)),
    }
}

/// Remainder that takes the sign of the divisor.
pub fn rem(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match coerce_numbers(ok!(to_number(lhs)), ok!(to_number(rhs))) {
        CoerceResult::I64(_, 0) => Err(division_by_zero()),
        CoerceResult::I64(a, b) => {
            let r = ok!(a.checked_rem(b).ok_or_else(|| failed_op("%", lhs, rhs)));
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::from(r + b))
            } else {
                Ok(Value::from(r))
            }
        }
        CoerceResult::F64(_, b) if b == 0.0 => Err(division_by_zero()),
        CoerceResult::F64(a, b) => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                Ok(Value::from(r + b))
            } else {
                Ok(Value::from(r))
            }
        }
    }
}

pub fn abs(value: &Value) -> Result<Value, Error> {
    match ok!(to_number(value)) {
        Number::Int(val) => val
            .checked_abs()
            .map(Value::from)
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "overflow in abs")),
        Number::Float(val) => Ok(Value::from(val.abs())),
    }
}

/// Orders numbers against numbers and strings against strings.
pub fn partial_order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (&lhs.0, &rhs.0) {
        (ValueRepr::String(a), ValueRepr::String(b)) => Some(a.cmp(b)),
        _ => match some!(coerce(lhs, rhs)) {
            CoerceResult::I64(a, b) => Some(a.cmp(&b)),
            CoerceResult::F64(a, b) => a.partial_cmp(&b),
        },
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value.0 {
        ValueRepr::Undefined | ValueRepr::None => 0,
        ValueRepr::Bool(_) => 1,
        ValueRepr::I64(_) | ValueRepr::F64(_) => 2,
        ValueRepr::String(_) => 3,
        ValueRepr::Seq(_) => 4,
        ValueRepr::Map(_) => 5,
    }
}

/// A total order over all values used for sorting.
pub fn total_order(lhs: &Value, rhs: &Value) -> Ordering {
    match (&lhs.0, &rhs.0) {
        (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a.cmp(b),
        (ValueRepr::String(a), ValueRepr::String(b)) => a.cmp(b),
        _ => match coerce(lhs, rhs) {
            Some(CoerceResult::I64(a, b)) => a.cmp(&b),
            Some(CoerceResult::F64(a, b)) => a.total_cmp(&b),
            None => kind_rank(lhs).cmp(&kind_rank(rhs)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_adding() {
        assert_eq!(add(&Value::from(1), &Value::from(2)).unwrap(), Value::from(3));
        assert_eq!(
            add(&Value::from("1"), &Value::from(1.5)).unwrap(),
            Value::from(2.5)
        );
        assert_eq!(add(&Value::UNDEFINED, &Value::from(4)).unwrap(), Value::from(4));
        let err = add(&Value::from("abc"), &Value::from(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_floored_division() {
        assert_eq!(div(&Value::from(7), &Value::from(2)).unwrap(), Value::from(3));
        assert_eq!(div(&Value::from(-7), &Value::from(2)).unwrap(), Value::from(-4));
        assert_eq!(rem(&Value::from(-7), &Value::from(3)).unwrap(), Value::from(2));
        assert_eq!(rem(&Value::from(7), &Value::from(-3)).unwrap(), Value::from(-2));
        assert_eq!(
            div(&Value::from(1), &Value::from(0)).unwrap_err().detail(),
            Some("divided by 0")
        );
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            partial_order(&Value::from(1), &Value::from(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(partial_order(&Value::from(1), &Value::from("1")), None);
        assert_eq!(
            total_order(&Value::from(()), &Value::from("a")),
            Ordering::Less
        );
    }
}
