use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::{Value, ValueRepr};

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => serializer.serialize_unit(),
            ValueRepr::Bool(b) => serializer.serialize_bool(b),
            ValueRepr::I64(n) => serializer.serialize_i64(n),
            ValueRepr::F64(n) => serializer.serialize_f64(n),
            ValueRepr::String(ref s) => serializer.serialize_str(s),
            ValueRepr::Seq(ref items) => {
                let mut seq = ok!(serializer.serialize_seq(Some(items.len())));
                for item in items.iter() {
                    ok!(seq.serialize_element(item));
                }
                seq.end()
            }
            ValueRepr::Map(ref map) => {
                let mut m = ok!(serializer.serialize_map(Some(map.len())));
                for (key, value) in map.iter() {
                    ok!(m.serialize_entry(&**key, value));
                }
                m.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => ValueRepr::None.into(),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => {
                if let Some(n) = n.as_i64() {
                    Value::from(n)
                } else if let Some(n) = n.as_u64() {
                    Value::from(n)
                } else {
                    Value::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
            serde_json::Value::Object(map) => ValueRepr::Map(Arc::new(
                map.into_iter()
                    .map(|(k, v)| (Arc::from(k), Value::from(v)))
                    .collect(),
            ))
            .into(),
        }
    }
}

#[test]
fn test_serde_bridge() {
    let value = Value::from_serialize(&serde_json::json!({
        "name": "Peter",
        "tags": ["a", 1, null, 2.5],
    }));
    assert_eq!(value.get_attr("name"), Value::from("Peter"));
    assert_eq!(value.get_attr("tags").len(), Some(4));
    assert_eq!(
        serde_json::to_string(&value).unwrap(),
        r#"{"name":"Peter","tags":["a",1,null,2.5]}"#
    );
}
