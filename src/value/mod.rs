//! Defines the [`Value`] enum, representing any data a template can read.

mod from;
mod json;

use std::borrow::Cow;
use std::mem;
use std::rc::Rc;

pub use indexmap::IndexMap;

pub use crate::value::json::to_value;
pub(crate) use crate::value::json::{to_json, to_json_pretty};

/// The list payload of a [`Value`].
pub type List = Vec<Value>;

/// The map payload of a [`Value`], iterated in insertion order.
pub type Map = IndexMap<String, Value>;

/// Data to be rendered represented as a recursive enum.
///
/// Lists and maps are reference counted, so cloning a value is cheap and
/// the clone refers to the very same collection. Use [`Value::ptr_eq`] to
/// check this identity.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Rc<List>),
    Map(Rc<Map>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Integer(s), Self::Integer(o)) => s == o,
            (Self::Float(s), Self::Float(o)) => s == o,
            (Self::String(s), Self::String(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

impl Value {
    /// Returns true if both values are the same list or the same map
    /// allocation.
    ///
    /// Scalars have no identity and always return false.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(s), Self::List(o)) => Rc::ptr_eq(s, o),
            (Self::Map(s), Self::Map(o)) => Rc::ptr_eq(s, o),
            _ => false,
        }
    }

    /// Construct a new empty map value.
    pub fn new_map() -> Self {
        Self::Map(Rc::new(Map::new()))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Returns a human readable name for the type of the value, used in
    /// error messages.
    pub(crate) fn human(&self) -> &'static str {
        match self {
            Self::None => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// The result of the `typeof` operator.
    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Self::None => "undefined",
            Self::Bool(_) => "boolean",
            Self::Integer(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::List(_) | Self::Map(_) => "object",
        }
    }

    /// Whether the value counts as true in a condition.
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are false, everything
    /// else is true, including empty lists and maps.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => !(*f == 0.0 || f.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) => true,
        }
    }

    /// Numeric conversion as performed by arithmetic operators.
    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
            Self::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Self::List(_) | Self::Map(_) => f64::NAN,
        }
    }

    /// The text written into the render tree for this value.
    ///
    /// Returns `None` for lists and maps which cannot be rendered as text.
    pub(crate) fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::List(_) | Self::Map(_) => None,
            v => Some(v.to_js_string()),
        }
    }

    /// String conversion as performed by string concatenation and the
    /// `String` function.
    pub(crate) fn to_js_string(&self) -> Cow<'_, str> {
        match self {
            Self::None => Cow::Borrowed(""),
            Self::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Self::Integer(i) => Cow::Owned(i.to_string()),
            Self::Float(f) => Cow::Owned(format_float(*f)),
            Self::String(s) => Cow::Borrowed(s),
            Self::List(l) => Cow::Owned(
                l.iter()
                    .map(|v| v.to_js_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Self::Map(_) => Cow::Borrowed("[object Object]"),
        }
    }
}

/// The result of an arithmetic operation, an integer when it is integral.
pub(crate) fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 && !(f == 0.0 && f.is_sign_negative()) {
        Value::Integer(f as i64)
    } else {
        Value::Float(f)
    }
}

/// The `===` operator.
///
/// Numbers compare by value regardless of representation, lists and maps
/// compare by identity.
pub(crate) fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.to_number() == b.to_number()
        }
        (Value::String(a), Value::String(b)) => a == b,
        (a, b) => a.ptr_eq(b),
    }
}

/// The `==` operator.
///
/// Like [`strict_eq`] except that `null` only equals `null` and mixed
/// scalars are compared as numbers.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, _) | (_, Value::None) => a.is_none() && b.is_none(),
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => {
            strict_eq(a, b)
        }
        (Value::String(a), Value::String(b)) => a == b,
        _ => a.to_number() == b.to_number(),
    }
}

/// Formats a float without a fractional part when it is integral.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        String::from("NaN")
    } else if f.is_infinite() {
        String::from(if f > 0.0 { "Infinity" } else { "-Infinity" })
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{}", f as i128)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_ptr_eq() {
        let list = Value::from(vec![1, 2, 3]);
        let same = list.clone();
        let equal = Value::from(vec![1, 2, 3]);
        assert!(list.ptr_eq(&same));
        assert!(!list.ptr_eq(&equal));
        assert_eq!(list, equal);
        assert!(!Value::from(1).ptr_eq(&Value::from(1)));
    }

    #[test]
    fn value_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::from(Vec::<i32>::new()).is_truthy());
        assert!(Value::new_map().is_truthy());
    }

    #[test]
    fn value_to_text() {
        assert_eq!(Value::None.to_text().unwrap(), "");
        assert_eq!(Value::from(true).to_text().unwrap(), "true");
        assert_eq!(Value::from(3.0).to_text().unwrap(), "3");
        assert_eq!(Value::from(-2.5).to_text().unwrap(), "-2.5");
        assert_eq!(Value::from(f64::NAN).to_text().unwrap(), "NaN");
        assert!(Value::from(vec![1]).to_text().is_none());
        assert!(Value::new_map().to_text().is_none());
    }

    #[test]
    fn value_to_js_string_list() {
        let v = Value::from(vec![Value::from(1), Value::from("a"), Value::None]);
        assert_eq!(v.to_js_string(), "1,a,");
    }

    #[test]
    fn value_equality_operators() {
        assert!(strict_eq(&Value::from(1), &Value::from(1.0)));
        assert!(!strict_eq(&Value::from(1), &Value::from("1")));
        assert!(loose_eq(&Value::from(1), &Value::from("1")));
        assert!(loose_eq(&Value::None, &Value::None));
        assert!(!loose_eq(&Value::None, &Value::from(0)));

        let list = Value::from(vec![1]);
        assert!(strict_eq(&list, &list.clone()));
        assert!(!strict_eq(&list, &Value::from(vec![1])));
    }

    #[test]
    fn value_number() {
        assert!(matches!(number(3.0), Value::Integer(3)));
        assert!(matches!(number(2.5), Value::Float(_)));
        assert!(matches!(number(f64::NAN), Value::Float(_)));
    }

    #[test]
    fn value_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::from(true).to_number(), 1.0);
    }
}
