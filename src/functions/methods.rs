//! Methods and properties available on values, e.g. `name.toUpperCase()`.

use crate::functions::arg;
use crate::value::{self, strict_eq};
use crate::{Error, ErrorKind, Result, Value};

/// Looks up a builtin property, currently only `length`.
pub fn property(value: &Value, name: &str) -> Option<Value> {
    match (value, name) {
        (Value::String(s), "length") => Some(Value::from(s.chars().count())),
        (Value::List(l), "length") => Some(Value::from(l.len())),
        _ => None,
    }
}

/// Calls a method on a value.
pub fn call(value: &Value, name: &str, args: &[Value]) -> Result<Value> {
    match (value, name) {
        (Value::String(s), "toUpperCase") => Ok(s.to_uppercase().into()),
        (Value::String(s), "toLowerCase") => Ok(s.to_lowercase().into()),
        (Value::String(s), "trim") => Ok(s.trim().into()),
        (Value::String(s), "includes") => Ok(s.contains(&*arg(args, 0).to_js_string()).into()),
        (Value::String(s), "startsWith") => {
            Ok(s.starts_with(&*arg(args, 0).to_js_string()).into())
        }
        (Value::String(s), "endsWith") => Ok(s.ends_with(&*arg(args, 0).to_js_string()).into()),
        (Value::String(s), "indexOf") => {
            let needle = arg(args, 0);
            let i = match s.find(&*needle.to_js_string()) {
                Some(b) => s[..b].chars().count() as i64,
                None => -1,
            };
            Ok(i.into())
        }
        (Value::String(s), "split") => {
            let list: Value = match arg(args, 0) {
                Value::None => vec![Value::from(s.as_str())].into(),
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(&*sep).map(Value::from).collect()
                    }
                }
            };
            Ok(list)
        }
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (m, n) = slice_bounds(chars.len(), args);
            Ok(chars[m..n].iter().collect::<String>().into())
        }
        (Value::String(s), "replace") => {
            let from = arg(args, 0);
            let to = arg(args, 1);
            Ok(s.replacen(&*from.to_js_string(), &to.to_js_string(), 1).into())
        }

        (Value::List(l), "includes") => {
            let needle = arg(args, 0);
            Ok(l.iter().any(|v| strict_eq(v, &needle)).into())
        }
        (Value::List(l), "indexOf") => {
            let needle = arg(args, 0);
            let i = l
                .iter()
                .position(|v| strict_eq(v, &needle))
                .map_or(-1, |i| i as i64);
            Ok(i.into())
        }
        (Value::List(l), "join") => {
            let sep = match arg(args, 0) {
                Value::None => String::from(","),
                sep => sep.to_js_string().into_owned(),
            };
            let parts: Vec<_> = l.iter().map(|v| v.to_js_string()).collect();
            Ok(parts.join(&sep).into())
        }
        (Value::List(l), "slice") => {
            let (m, n) = slice_bounds(l.len(), args);
            Ok(l[m..n].to_vec().into())
        }

        (Value::Integer(_) | Value::Float(_), "toFixed") => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            let n = value.to_number();
            if n.is_finite() {
                Ok(format!("{n:.digits$}").into())
            } else {
                Ok(value::format_float(n).into())
            }
        }

        (_, "toString") => Ok(value.to_js_string().into_owned().into()),

        (v, name) => Err(Error::message(
            ErrorKind::Eval,
            format!("unknown method `{name}` on {}", v.human()),
        )),
    }
}

/// Resolves `slice(start, end)` arguments against a length, negative
/// positions count from the end.
fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let resolve = |v: Value, default: usize| -> usize {
        if v.is_none() {
            return default;
        }
        let n = v.to_number();
        if n.is_nan() {
            0
        } else if n < 0.0 {
            len.saturating_sub((-n) as usize)
        } else {
            (n as usize).min(len)
        }
    };
    let m = resolve(arg(args, 0), 0);
    let n = resolve(arg(args, 1), len);
    (m, n.max(m))
}
