use crate::error::{Error, ErrorKind};
use crate::value::ops::{self, Number};
use crate::value::{Value, ValueRepr};

/// A utility trait that represents the return value of filters.
///
/// It's implemented for the following types:
///
/// * `Rv` where `Rv` implements `Into<Value>`
/// * `Result<Rv, Error>` where `Rv` implements `Into<Value>`
pub trait FunctionResult {
    #[doc(hidden)]
    fn into_result(self) -> Result<Value, Error>;
}

impl<I: Into<Value>> FunctionResult for Result<I, Error> {
    fn into_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<I: Into<Value>> FunctionResult for I {
    fn into_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Helper trait representing valid filter arguments.
///
/// Filters are written with concrete types instead of values and this trait
/// performs the conversion.  It is implemented for tuples of up to four
/// [`ArgType`]s.  The first element receives the piped value, the remaining
/// ones the arguments after the colon.
pub trait FunctionArgs: Sized {
    /// Converts to function arguments from a slice of values.
    fn from_values(values: &[Value]) -> Result<Self, Error>;
}

/// A trait implemented by all filter argument types.
///
/// Optional arguments are expressed with [`Option`]; nil values passed to an
/// optional argument are treated as missing.
pub trait ArgType: Sized {
    #[doc(hidden)]
    fn from_value(value: Option<&Value>) -> Result<Self, Error>;
}

fn missing_argument() -> Error {
    Error::new(ErrorKind::InvalidArguments, "missing argument")
}

fn unexpected(expected: &str, value: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidArguments,
        format!("expected {expected}, got {}", value.kind()),
    )
}

impl ArgType for Value {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            Some(value) => Ok(value.clone()),
            None => Err(missing_argument()),
        }
    }
}

impl ArgType for String {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            Some(value) => Ok(value.to_string()),
            None => Err(missing_argument()),
        }
    }
}

impl ArgType for bool {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            Some(Value(ValueRepr::Bool(val))) => Ok(*val),
            Some(value) => Err(unexpected("boolean", value)),
            None => Err(missing_argument()),
        }
    }
}

impl ArgType for i64 {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match ops::to_number(value) {
            Ok(Number::Int(val)) => Ok(val),
            Ok(Number::Float(val)) if val.fract() == 0.0 => Ok(val as i64),
            _ => Err(unexpected("integer", value)),
        }
    }
}

impl ArgType for usize {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let val = ok!(i64::from_value(value));
        usize::try_from(val).map_err(|_| {
            Error::new(
                ErrorKind::InvalidArguments,
                format!("expected a non-negative integer, got {val}"),
            )
        })
    }
}

impl ArgType for f64 {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match ops::to_number(value) {
            Ok(Number::Int(val)) => Ok(val as f64),
            Ok(Number::Float(val)) => Ok(val),
            Err(_) => Err(unexpected("number", value)),
        }
    }
}

impl ArgType for Vec<Value> {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match value.0 {
            ValueRepr::Seq(ref items) => Ok(items.to_vec()),
            _ => Err(unexpected("sequence", value)),
        }
    }
}

impl<T: ArgType> ArgType for Option<T> {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            None => Ok(None),
            Some(value) if value.is_nil() => Ok(None),
            Some(value) => T::from_value(Some(value)).map(Some),
        }
    }
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<$($name: ArgType,)*> FunctionArgs for ($($name,)*) {
            fn from_values(values: &[Value]) -> Result<Self, Error> {
                #![allow(non_snake_case, unused)]
                let mut idx = 0;
                $(
                    let $name = ok!($name::from_value(values.get(idx)));
                    idx += 1;
                )*
                if values.len() > idx {
                    Err(Error::new(
                        ErrorKind::InvalidArguments,
                        format!("expected at most {} arguments, got {}", idx, values.len()),
                    ))
                } else {
                    Ok(( $($name,)* ))
                }
            }
        }
    };
}

tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }
tuple_impls! { A B C D }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        let values = [Value::from("a"), Value::from(1)];
        let (a, b) = <(String, i64)>::from_values(&values).unwrap();
        assert_eq!((a.as_str(), b), ("a", 1));
        let (a, b) = <(String, Option<i64>)>::from_values(&values[..1]).unwrap();
        assert_eq!((a.as_str(), b), ("a", None));
        let err = <(String,)>::from_values(&values).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        let err = <(String, i64)>::from_values(&values[..1]).unwrap_err();
        assert_eq!(err.detail(), Some("missing argument"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = <(i64,)>::from_values(&[Value::from("x")]).unwrap_err();
        assert_eq!(err.detail(), Some("expected integer, got string"));
    }
}
