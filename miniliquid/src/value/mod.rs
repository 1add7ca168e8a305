//! Provides a dynamic value type abstraction.
//!
//! This module gives access to a dynamically typed value which is used by
//! the template engine during execution.
//!
//! For the most part the existence of the value type can be ignored as
//! miniliquid will perform the necessary conversions for you.  For instance
//! if you write a filter that converts a string you can directly declare the
//! filter to take a [`String`](std::string::String).  However for some more
//! advanced use cases (like writing custom tags) it's useful to know that
//! this type exists.
//!
//! # Basic Value Conversions
//!
//! Values are typically created via the [`From`] trait:
//!
//! ```
//! # use miniliquid::value::Value;
//! let int_value = Value::from(42);
//! let none_value = Value::from(());
//! let true_value = Value::from(true);
//! ```
//!
//! Or via the [`FromIterator`] trait:
//!
//! ```
//! # use miniliquid::value::Value;
//! // collection into a sequence
//! let value: Value = (1..10).into_iter().collect();
//!
//! // collection into a map
//! let value: Value = [("key", "value")].into_iter().collect();
//! ```
//!
//! # Serde Conversions
//!
//! When a template is rendered the assigns are converted through [`serde`].
//! This can also be triggered manually by using [`Value::from_serialize`]:
//!
//! ```
//! # use miniliquid::value::Value;
//! let value = Value::from_serialize(&[1, 2, 3]);
//! ```
//!
//! # Memory Management
//!
//! Values are immutable objects which are internally reference counted which
//! means they can be copied relatively cheaply.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, ErrorKind};

pub use crate::value::argtypes::{ArgType, FunctionArgs, FunctionResult};

mod argtypes;
pub(crate) mod ops;
mod serialize;

/// The map type used by values.
pub type ValueMap = BTreeMap<Arc<str>, Value>;

/// Describes the kind of value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is undefined
    Undefined,
    /// The value is the none (nil) singleton
    None,
    /// The value is a [`bool`]
    Bool,
    /// The value is a number of a supported type.
    Number,
    /// The value is a string.
    String,
    /// The value is a sequence of other values.
    Seq,
    /// The value is a key/value mapping.
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match *self {
            ValueKind::Undefined => "undefined",
            ValueKind::None => "none",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
        };
        write!(f, "{ty}")
    }
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Undefined,
    None,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(Arc<str>),
    Seq(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
}

impl fmt::Debug for ValueRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRepr::Undefined => f.write_str("undefined"),
            ValueRepr::None => f.write_str("none"),
            ValueRepr::Bool(val) => fmt::Debug::fmt(val, f),
            ValueRepr::I64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::F64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::String(val) => fmt::Debug::fmt(val, f),
            ValueRepr::Seq(val) => f.debug_list().entries(val.iter()).finish(),
            ValueRepr::Map(val) => f.debug_map().entries(val.iter()).finish(),
        }
    }
}

/// Represents a dynamically typed value in the template engine.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (
                ValueRepr::None | ValueRepr::Undefined,
                ValueRepr::None | ValueRepr::Undefined,
            ) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::String(a), ValueRepr::String(b)) => a == b,
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => a == b,
            (ValueRepr::Map(a), ValueRepr::Map(b)) => a == b,
            _ => match ops::coerce(self, other) {
                Some(ops::CoerceResult::I64(a, b)) => a == b,
                Some(ops::CoerceResult::F64(a, b)) => a == b,
                None => false,
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        ops::partial_order(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ValueRepr::Undefined | ValueRepr::None => Ok(()),
            ValueRepr::Bool(val) => fmt::Display::fmt(val, f),
            ValueRepr::I64(val) => fmt::Display::fmt(val, f),
            ValueRepr::F64(val) => {
                if val.is_nan() {
                    f.write_str("NaN")
                } else if val.is_infinite() {
                    write!(f, "{}inf", if val.is_sign_negative() { "-" } else { "" })
                } else {
                    let mut num = val.to_string();
                    if !num.contains('.') {
                        num.push_str(".0");
                    }
                    write!(f, "{num}")
                }
            }
            ValueRepr::String(val) => write!(f, "{val}"),
            ValueRepr::Seq(items) => {
                for item in items.iter() {
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            ValueRepr::Map(map) => fmt::Debug::fmt(map, f),
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::UNDEFINED
    }
}

#[allow(clippy::len_without_is_empty)]
impl Value {
    /// The undefined value.
    ///
    /// This constant exists because the undefined type does not exist in Rust
    /// and this is the only way to construct it.
    pub const UNDEFINED: Value = Value(ValueRepr::Undefined);

    /// Creates a value from something that can be serialized.
    ///
    /// Values that fail to serialize turn into undefined.  Use
    /// [`try_from_serialize`](Self::try_from_serialize) to observe the error.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Value {
        Value::try_from_serialize(value).unwrap_or(Value::UNDEFINED)
    }

    /// Creates a value from something that can be serialized or fails.
    pub fn try_from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
        serde_json::to_value(value).map(Value::from).map_err(|err| {
            Error::new(ErrorKind::BadSerialization, "unable to convert value").with_source(err)
        })
    }

    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Undefined => ValueKind::Undefined,
            ValueRepr::None => ValueKind::None,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(_) => ValueKind::String,
            ValueRepr::Seq(_) => ValueKind::Seq,
            ValueRepr::Map(_) => ValueKind::Map,
        }
    }

    /// Is this value true?
    ///
    /// Only `false`, none and undefined are considered false.  Empty strings,
    /// zero and empty sequences are all true.
    pub fn is_true(&self) -> bool {
        !matches!(
            self.0,
            ValueRepr::Undefined | ValueRepr::None | ValueRepr::Bool(false)
        )
    }

    /// Returns `true` if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self.0, ValueRepr::Undefined)
    }

    /// Returns `true` if this value is none.
    pub fn is_none(&self) -> bool {
        matches!(self.0, ValueRepr::None)
    }

    /// Returns `true` for none and undefined.
    pub(crate) fn is_nil(&self) -> bool {
        matches!(self.0, ValueRepr::None | ValueRepr::Undefined)
    }

    /// If the value is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// If the value is an integer, return it.
    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            ValueRepr::I64(val) => Some(val),
            _ => None,
        }
    }

    /// If the value is a sequence, return its items.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Seq(ref items) => Some(&items[..]),
            _ => None,
        }
    }

    /// If the value is a map, return it.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Map(ref map) => Some(map),
            _ => None,
        }
    }

    /// Returns the length of the contained value.
    ///
    /// Strings report their length in characters.
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s.chars().count()),
            ValueRepr::Seq(ref items) => Some(items.len()),
            ValueRepr::Map(ref map) => Some(map.len()),
            _ => None,
        }
    }

    /// Looks up an attribute by name.
    ///
    /// Maps are looked up by key.  Sequences support the `first`, `last` and
    /// `size` attributes, strings and maps without such a key support `size`.
    /// Missing attributes resolve to undefined.
    pub fn get_attr(&self, key: &str) -> Value {
        match self.0 {
            ValueRepr::Map(ref map) => match map.get(key) {
                Some(value) => value.clone(),
                None if key == "size" => Value::from(map.len()),
                None => Value::UNDEFINED,
            },
            ValueRepr::Seq(ref items) => match key {
                "first" => items.first().cloned().unwrap_or_default(),
                "last" => items.last().cloned().unwrap_or_default(),
                "size" => Value::from(items.len()),
                _ => Value::UNDEFINED,
            },
            ValueRepr::String(ref s) if key == "size" => Value::from(s.chars().count()),
            _ => Value::UNDEFINED,
        }
    }

    /// Looks up an item by index or key.
    ///
    /// Negative indexes into sequences count from the end.
    pub fn get_item(&self, key: &Value) -> Value {
        match (&self.0, &key.0) {
            (ValueRepr::Seq(items), ValueRepr::I64(idx)) => {
                let idx = if *idx < 0 {
                    match items.len().checked_sub(idx.unsigned_abs() as usize) {
                        Some(idx) => idx,
                        None => return Value::UNDEFINED,
                    }
                } else {
                    *idx as usize
                };
                items.get(idx).cloned().unwrap_or_default()
            }
            (_, ValueRepr::String(name)) => self.get_attr(name),
            _ => Value::UNDEFINED,
        }
    }

    /// Returns the items this value produces when iterated over.
    ///
    /// Maps iterate as `[key, value]` pairs, strings produce themselves once
    /// and none or undefined iterate as empty.
    pub fn try_iter(&self) -> Result<Vec<Value>, Error> {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => Ok(Vec::new()),
            ValueRepr::Seq(ref items) => Ok(items.to_vec()),
            ValueRepr::Map(ref map) => Ok(map
                .iter()
                .map(|(key, value)| Value::from(vec![Value::from(key.clone()), value.clone()]))
                .collect()),
            ValueRepr::String(_) => Ok(vec![self.clone()]),
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("{} is not iterable", self.kind()),
            )),
        }
    }

    /// Checks if the value contains another.
    ///
    /// Strings check for substrings, sequences for membership and maps for
    /// the presence of a key.
    pub fn contains(&self, needle: &Value) -> bool {
        match self.0 {
            ValueRepr::String(ref s) => match needle.0 {
                ValueRepr::Undefined | ValueRepr::None => false,
                _ => s.contains(&needle.to_string() as &str),
            },
            ValueRepr::Seq(ref items) => items.iter().any(|item| item == needle),
            ValueRepr::Map(ref map) => needle
                .as_str()
                .map_or(false, |key| map.contains_key(key)),
            _ => false,
        }
    }
}

impl From<ValueRepr> for Value {
    #[inline(always)]
    fn from(val: ValueRepr) -> Value {
        Value(val)
    }
}

macro_rules! value_from {
    ($src:ty, $dst:ident) => {
        impl From<$src> for Value {
            #[inline(always)]
            fn from(val: $src) -> Self {
                ValueRepr::$dst(val as _).into()
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(u8, I64);
value_from!(u16, I64);
value_from!(u32, I64);
value_from!(i8, I64);
value_from!(i16, I64);
value_from!(i32, I64);
value_from!(i64, I64);
value_from!(f32, F64);
value_from!(f64, F64);

impl From<u64> for Value {
    fn from(val: u64) -> Self {
        match i64::try_from(val) {
            Ok(val) => ValueRepr::I64(val).into(),
            Err(_) => ValueRepr::F64(val as f64).into(),
        }
    }
}

impl From<usize> for Value {
    fn from(val: usize) -> Self {
        Value::from(val as u64)
    }
}

impl From<()> for Value {
    #[inline(always)]
    fn from(_: ()) -> Self {
        ValueRepr::None.into()
    }
}

impl<'a> From<&'a str> for Value {
    #[inline(always)]
    fn from(val: &'a str) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(val: String) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl<'a> From<Cow<'a, str>> for Value {
    #[inline(always)]
    fn from(val: Cow<'a, str>) -> Self {
        match val {
            Cow::Borrowed(x) => x.into(),
            Cow::Owned(x) => x.into(),
        }
    }
}

impl From<Arc<str>> for Value {
    #[inline(always)]
    fn from(val: Arc<str>) -> Self {
        ValueRepr::String(val).into()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        ValueRepr::Seq(Arc::new(val.into_iter().map(Into::into).collect())).into()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => ValueRepr::None.into(),
        }
    }
}

impl<K: AsRef<str>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(val: BTreeMap<K, V>) -> Self {
        val.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(val: HashMap<K, V>) -> Self {
        val.into_iter().collect()
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        ValueRepr::Seq(Arc::new(iter.into_iter().map(Into::into).collect())).into()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        ValueRepr::Map(Arc::new(
            iter.into_iter()
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into()))
                .collect(),
        ))
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Value::UNDEFINED.to_string(), "");
        assert_eq!(Value::from(()).to_string(), "");
        assert_eq!(Value::from(2.0).to_string(), "2.0");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "ab");
        assert_eq!(
            Value::from_iter([("a", 1)]).to_string(),
            "{\"a\": 1}"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from("").is_true());
        assert!(Value::from(0).is_true());
        assert!(!Value::from(false).is_true());
        assert!(!Value::from(()).is_true());
        assert!(!Value::UNDEFINED.is_true());
    }

    #[test]
    fn test_attributes() {
        let seq = Value::from(vec![1, 2, 3]);
        assert_eq!(seq.get_attr("first"), Value::from(1));
        assert_eq!(seq.get_attr("last"), Value::from(3));
        assert_eq!(seq.get_attr("size"), Value::from(3));
        assert_eq!(seq.get_item(&Value::from(-1)), Value::from(3));
        assert!(seq.get_item(&Value::from(-4)).is_undefined());
        assert_eq!(Value::from("äbc").get_attr("size"), Value::from(3));
    }

    #[test]
    fn test_contains() {
        assert!(Value::from("hello world").contains(&Value::from("o w")));
        assert!(Value::from(vec![1, 2]).contains(&Value::from(2.0)));
        assert!(Value::from_iter([("a", 1)]).contains(&Value::from("a")));
        assert!(!Value::from(42).contains(&Value::from(4)));
    }
}
