use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap};

use crate::value::Map;
use crate::{Result, Value};

/// Convert a `T` to a `Value`.
///
/// Structs and maps become [`Value::Map`] with their fields in declaration
/// order.
///
/// # Examples
///
/// ```
/// #[derive(serde::Serialize)]
/// struct Todo {
///     title: String,
///     done: bool,
/// }
///
/// let todo = Todo { title: "Write docs".into(), done: false };
/// let value = strand::to_value(&todo)?;
/// assert_eq!(value, strand::value! { title: "Write docs", done: false });
/// # Ok::<(), strand::Error>(())
/// ```
pub fn to_value<T>(value: T) -> Result<Value>
where
    T: Serialize,
{
    let json = serde_json::to_value(value)?;
    Ok(Value::from(json))
}

/// Serializes a value as compact JSON, as `JSON.stringify` does.
pub(crate) fn to_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serializes a value as JSON indented by two spaces.
pub(crate) fn to_json_pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(list) => {
                Self::List(Rc::new(list.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Self::Map(Rc::new(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(string) => serializer.serialize_str(string),
            Value::List(list) => list.serialize(serializer),
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}
