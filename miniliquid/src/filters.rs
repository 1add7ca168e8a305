//! Filter functions and abstractions.
//!
//! Filters are functions which are applied to values to modify them.  For
//! example the expression `{{ "hello" | append: " world" }}` invokes the
//! filter `append` with the piped value `"hello"` and the argument
//! `" world"`.  Filters of a chain are applied left to right, every filter
//! receives the output of the one before it.
//!
//! ## Custom Filters
//!
//! A custom filter is just a simple function which accepts the piped value
//! and its arguments as parameters and returns a new value.  For instance
//! the following shows a filter which replaces whitespace with dashes and
//! converts it to lowercase:
//!
//! ```
//! # use miniliquid::{Environment, Error};
//! # let mut env = Environment::new();
//! fn slugify(value: String) -> Result<String, Error> {
//!     Ok(value.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-"))
//! }
//!
//! env.add_filter("slugify", slugify);
//! ```
//!
//! miniliquid will perform the necessary conversions automatically via the
//! [`FunctionArgs`](crate::value::FunctionArgs) and
//! [`FunctionResult`](crate::value::FunctionResult) traits.  Passing too
//! many or too few arguments, or arguments of the wrong type, fails with
//! [`ErrorKind::InvalidArguments`](crate::ErrorKind::InvalidArguments).
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;
use crate::value::{FunctionArgs, FunctionResult, Value};

type FilterFunc = dyn Fn(&[Value]) -> Result<Value, Error> + Sync + Send + 'static;

#[derive(Clone)]
pub(crate) struct BoxedFilter(Arc<FilterFunc>);

/// A utility trait that represents filters.
///
/// The first argument of the function is the piped value, the rest are the
/// arguments given after the colon.
pub trait Filter<Rv, Args>: Send + Sync + 'static {
    /// Applies a filter to value with the given arguments.
    fn apply_to(&self, args: Args) -> Rv;
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<Func, Rv, $($name),*> Filter<Rv, ($($name,)*)> for Func
        where
            Func: Fn($($name),*) -> Rv + Send + Sync + 'static
        {
            fn apply_to(&self, args: ($($name,)*)) -> Rv {
                #[allow(non_snake_case)]
                let ($($name,)*) = args;
                (self)($($name,)*)
            }
        }
    };
}

tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }
tuple_impls! { A B C D }

impl BoxedFilter {
    /// Creates a new boxed filter.
    pub fn new<F, Rv, Args>(f: F) -> BoxedFilter
    where
        F: Filter<Rv, Args>,
        Rv: FunctionResult,
        Args: FunctionArgs,
    {
        BoxedFilter(Arc::new(move |args| -> Result<Value, Error> {
            f.apply_to(ok!(Args::from_values(args))).into_result()
        }))
    }

    /// Applies the filter to a value and argument.
    ///
    /// The piped value comes first.
    pub fn apply_to(&self, args: &[Value]) -> Result<Value, Error> {
        (self.0)(args)
    }
}

pub(crate) fn get_builtin_filters() -> BTreeMap<&'static str, BoxedFilter> {
    #[allow(unused_mut)]
    let mut rv = BTreeMap::new();
    #[cfg(feature = "builtins")]
    {
        rv.insert("upcase", BoxedFilter::new(upcase));
        rv.insert("downcase", BoxedFilter::new(downcase));
        rv.insert("capitalize", BoxedFilter::new(capitalize));
        rv.insert("append", BoxedFilter::new(append));
        rv.insert("prepend", BoxedFilter::new(prepend));
        rv.insert("strip", BoxedFilter::new(strip));
        rv.insert("lstrip", BoxedFilter::new(lstrip));
        rv.insert("rstrip", BoxedFilter::new(rstrip));
        rv.insert("replace", BoxedFilter::new(replace));
        rv.insert("remove", BoxedFilter::new(remove));
        rv.insert("split", BoxedFilter::new(split));
        rv.insert("join", BoxedFilter::new(join));
        rv.insert("size", BoxedFilter::new(size));
        rv.insert("first", BoxedFilter::new(first));
        rv.insert("last", BoxedFilter::new(last));
        rv.insert("reverse", BoxedFilter::new(reverse));
        rv.insert("sort", BoxedFilter::new(sort));
        rv.insert("default", BoxedFilter::new(default));
        rv.insert("plus", BoxedFilter::new(plus));
        rv.insert("minus", BoxedFilter::new(minus));
        rv.insert("times", BoxedFilter::new(times));
        rv.insert("divided_by", BoxedFilter::new(divided_by));
        rv.insert("modulo", BoxedFilter::new(modulo));
        rv.insert("abs", BoxedFilter::new(abs));
        rv.insert("escape", BoxedFilter::new(escape));
        #[cfg(feature = "json")]
        {
            rv.insert("json", BoxedFilter::new(json));
        }
    }
    rv
}

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    use crate::error::ErrorKind;
    use crate::utils::HtmlEscape;
    use crate::value::ops;

    /// Converts a value to uppercase.
    pub fn upcase(v: String) -> String {
        v.to_uppercase()
    }

    /// Converts a value to lowercase.
    pub fn downcase(v: String) -> String {
        v.to_lowercase()
    }

    /// Uppercases the first character and lowercases the rest.
    pub fn capitalize(v: String) -> String {
        let mut chars = v.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    }

    /// Appends a string.
    pub fn append(v: String, other: String) -> String {
        v + &other
    }

    /// Prepends a string.
    pub fn prepend(v: String, other: String) -> String {
        other + &v
    }

    /// Removes whitespace on both sides.
    pub fn strip(v: String) -> String {
        v.trim().to_string()
    }

    /// Removes leading whitespace.
    pub fn lstrip(v: String) -> String {
        v.trim_start().to_string()
    }

    /// Removes trailing whitespace.
    pub fn rstrip(v: String) -> String {
        v.trim_end().to_string()
    }

    /// Replaces every occurrence of a string with another.
    pub fn replace(v: String, from: String, to: String) -> String {
        v.replace(&from, &to)
    }

    /// Removes every occurrence of a string.
    pub fn remove(v: String, what: String) -> String {
        v.replace(&what, "")
    }

    /// Splits a string into a sequence.
    ///
    /// A single space splits on runs of whitespace, an empty separator
    /// splits into characters.
    pub fn split(v: String, sep: String) -> Value {
        if sep.is_empty() {
            v.chars().map(|c| Value::from(c.to_string())).collect()
        } else if sep == " " {
            v.split_whitespace().map(Value::from).collect()
        } else {
            v.split(sep.as_str()).map(Value::from).collect()
        }
    }

    /// Joins a sequence with a separator (a single space by default).
    pub fn join(v: Value, sep: Option<String>) -> Result<String, Error> {
        let sep = sep.as_deref().unwrap_or(" ");
        match v.as_slice() {
            Some(items) => Ok(items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(sep)),
            None if v.is_nil() => Ok(String::new()),
            None => Ok(v.to_string()),
        }
    }

    /// Returns the number of characters or items.
    pub fn size(v: Value) -> Value {
        Value::from(v.len().unwrap_or(0))
    }

    /// Returns the first item or character.
    pub fn first(v: Value) -> Value {
        match v.as_str() {
            Some(s) => s.chars().next().map(String::from).into(),
            None => v.get_attr("first"),
        }
    }

    /// Returns the last item or character.
    pub fn last(v: Value) -> Value {
        match v.as_str() {
            Some(s) => s.chars().next_back().map(String::from).into(),
            None => v.get_attr("last"),
        }
    }

    fn items(v: &Value, op: &str) -> Result<Vec<Value>, Error> {
        match v.as_slice() {
            Some(items) => Ok(items.to_vec()),
            None if v.is_nil() => Ok(Vec::new()),
            None => Err(Error::new(
                ErrorKind::InvalidArguments,
                format!("cannot {op} {}", v.kind()),
            )),
        }
    }

    /// Reverses a sequence.
    pub fn reverse(v: Value) -> Result<Value, Error> {
        let mut items = ok!(items(&v, "reverse"));
        items.reverse();
        Ok(Value::from(items))
    }

    /// Sorts a sequence.
    pub fn sort(v: Value) -> Result<Value, Error> {
        let mut items = ok!(items(&v, "sort"));
        items.sort_by(ops::total_order);
        Ok(Value::from(items))
    }

    /// Falls back to a default for nil, `false` and empty values.
    pub fn default(v: Value, other: Value) -> Value {
        if !v.is_true() || v.len() == Some(0) {
            other
        } else {
            v
        }
    }

    /// Adds a number.
    pub fn plus(v: Value, other: Value) -> Result<Value, Error> {
        ops::add(&v, &other)
    }

    /// Subtracts a number.
    pub fn minus(v: Value, other: Value) -> Result<Value, Error> {
        ops::sub(&v, &other)
    }

    /// Multiplies by a number.
    pub fn times(v: Value, other: Value) -> Result<Value, Error> {
        ops::mul(&v, &other)
    }

    /// Divides by a number; integers divide with flooring.
    pub fn divided_by(v: Value, other: Value) -> Result<Value, Error> {
        ops::div(&v, &other)
    }

    /// Remainder of a division.
    pub fn modulo(v: Value, other: Value) -> Result<Value, Error> {
        ops::rem(&v, &other)
    }

    /// Absolute value of a number.
    pub fn abs(v: Value) -> Result<Value, Error> {
        ops::abs(&v)
    }

    /// HTML escapes a string.
    pub fn escape(v: String) -> String {
        HtmlEscape(&v).to_string()
    }

    /// Serializes a value to JSON.
    #[cfg(feature = "json")]
    pub fn json(v: Value) -> Result<String, Error> {
        serde_json::to_string(&v).map_err(|err| {
            Error::new(ErrorKind::BadSerialization, "unable to format to JSON").with_source(err)
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use similar_asserts::assert_eq;

        #[test]
        fn test_strings() {
            assert_eq!(capitalize("hELLO wORLD".into()), "Hello world");
            assert_eq!(append("a".into(), "b".into()), "ab");
            assert_eq!(prepend("a".into(), "b".into()), "ba");
            assert_eq!(remove("banana".into(), "an".into()), "ba");
            assert_eq!(
                split("a  b c".into(), " ".into()),
                Value::from(vec!["a", "b", "c"])
            );
            assert_eq!(
                join(Value::from(vec![1, 2, 3]), Some("-".into())).unwrap(),
                "1-2-3"
            );
            assert_eq!(join(Value::from(vec!["a", "b"]), None).unwrap(), "a b");
        }

        #[test]
        fn test_sequences() {
            assert_eq!(
                sort(Value::from(vec![3, 1, 2])).unwrap(),
                Value::from(vec![1, 2, 3])
            );
            assert_eq!(
                reverse(Value::from(vec!["a", "b"])).unwrap(),
                Value::from(vec!["b", "a"])
            );
            assert_eq!(
                reverse(Value::from(42)).unwrap_err().kind(),
                ErrorKind::InvalidArguments
            );
            assert_eq!(first(Value::from("abc")), Value::from("a"));
            assert_eq!(last(Value::from(vec![1, 2])), Value::from(2));
            assert_eq!(size(Value::UNDEFINED), Value::from(0));
        }

        #[test]
        fn test_default() {
            assert_eq!(default(Value::UNDEFINED, "x".into()), Value::from("x"));
            assert_eq!(default(Value::from(""), "x".into()), Value::from("x"));
            assert_eq!(default(Value::from(0), "x".into()), Value::from(0));
        }
    }
}

#[cfg(feature = "builtins")]
pub use self::builtins::*;
