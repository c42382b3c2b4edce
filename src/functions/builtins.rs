//! Builtin global functions.

use crate::functions::{self, arg, Functions};
use crate::value::{self, to_json, to_json_pretty};
use crate::{Error, ErrorKind, Result, Value};

/// Registers every builtin on the given set.
pub fn register(functions: &mut Functions) {
    functions.insert("String", functions::new(string));
    functions.insert("Number", functions::new(number));
    functions.insert("Boolean", functions::new(boolean));
    functions.insert("parseInt", functions::new(parse_int));
    functions.insert("parseFloat", functions::new(parse_float));
    functions.insert("isNaN", functions::new(is_nan));
    functions.insert("encodeURIComponent", functions::new(encode_uri_component));
    functions.insert("Math.max", functions::new(max));
    functions.insert("Math.min", functions::new(min));
    functions.insert("Math.floor", functions::new(|a: &[Value]| round_with(a, f64::floor)));
    functions.insert("Math.ceil", functions::new(|a: &[Value]| round_with(a, f64::ceil)));
    functions.insert("Math.round", functions::new(|a: &[Value]| round_with(a, js_round)));
    functions.insert("Math.abs", functions::new(|a: &[Value]| round_with(a, f64::abs)));
    functions.insert("JSON.stringify", functions::new(stringify));
    functions.insert("Object.keys", functions::new(keys));
    functions.insert("Object.values", functions::new(values));
    functions.insert("Object.entries", functions::new(entries));
    functions.insert("Array.isArray", functions::new(is_array));
}

/// Converts the value to a string like string concatenation does.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn string(args: &[Value]) -> String {
    arg(args, 0).to_js_string().into_owned()
}

/// Converts the value to a number, `NaN` if it is not numeric.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn number(args: &[Value]) -> Value {
    value::number(arg(args, 0).to_number())
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn boolean(args: &[Value]) -> bool {
    arg(args, 0).is_truthy()
}

/// Parses the leading integer of a string in the given radix, defaulting to
/// base ten.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn parse_int(args: &[Value]) -> Value {
    let s = arg(args, 0);
    let s = s.to_js_string();
    let mut s = s.trim_start();

    let neg = s.starts_with('-');
    if neg || s.starts_with('+') {
        s = &s[1..];
    }

    let mut radix = match arg(args, 1).to_number() {
        r if r.is_nan() || r == 0.0 => 10,
        r => r as u32,
    };
    if !(2..=36).contains(&radix) {
        return Value::Float(f64::NAN);
    }
    if radix == 16 || args.len() < 2 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    match i64::from_str_radix(&digits, radix) {
        Ok(i) if neg => Value::Integer(-i),
        Ok(i) => Value::Integer(i),
        Err(_) => Value::Float(f64::NAN),
    }
}

/// Parses the leading decimal number of a string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn parse_float(args: &[Value]) -> Value {
    let s = arg(args, 0);
    let s = s.to_js_string();
    let s = s.trim_start();
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return Value::Float(f64::INFINITY);
    }
    if s.starts_with("-Infinity") {
        return Value::Float(f64::NEG_INFINITY);
    }

    // The longest numeric prefix that parses wins.
    let mut best = f64::NAN;
    for (i, c) in s.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        if let Ok(f) = s[..i + c.len_utf8()].parse::<f64>() {
            best = f;
        }
    }
    value::number(best)
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn is_nan(args: &[Value]) -> bool {
    arg(args, 0).to_number().is_nan()
}

/// Percent encodes everything except the unreserved URI characters.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn encode_uri_component(args: &[Value]) -> String {
    let s = arg(args, 0);
    let mut out = String::new();
    for b in s.to_js_string().bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(char::from(b)),
            b => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn max(args: &[Value]) -> Value {
    fold(args, f64::NEG_INFINITY, f64::max)
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn min(args: &[Value]) -> Value {
    fold(args, f64::INFINITY, f64::min)
}

fn fold(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> Value {
    let mut acc = init;
    for v in args {
        let n = v.to_number();
        if n.is_nan() {
            return Value::Float(f64::NAN);
        }
        acc = f(acc, n);
    }
    value::number(acc)
}

fn round_with(args: &[Value], f: fn(f64) -> f64) -> Value {
    value::number(f(arg(args, 0).to_number()))
}

/// Rounds half way cases towards positive infinity.
fn js_round(n: f64) -> f64 {
    (n + 0.5).floor()
}

/// Serializes the value as JSON, pretty printed when an indent is given.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn stringify(args: &[Value]) -> Result<String> {
    let value = arg(args, 0);
    if arg(args, 2).is_truthy() {
        to_json_pretty(&value)
    } else {
        to_json(&value)
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn keys(args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Map(map) => Ok(map.keys().map(|k| Value::from(k.as_str())).collect()),
        Value::List(list) => Ok((0..list.len()).map(|i| Value::from(i.to_string())).collect()),
        v => Err(err_expected_object("Object.keys", &v)),
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn values(args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Map(map) => Ok(map.values().cloned().collect()),
        Value::List(list) => Ok(Value::List(list)),
        v => Err(err_expected_object("Object.values", &v)),
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn entries(args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Map(map) => Ok(map
            .iter()
            .map(|(k, v)| Value::from(vec![Value::from(k.as_str()), v.clone()]))
            .collect()),
        Value::List(list) => Ok(list
            .iter()
            .enumerate()
            .map(|(i, v)| Value::from(vec![Value::from(i.to_string()), v.clone()]))
            .collect()),
        v => Err(err_expected_object("Object.entries", &v)),
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn is_array(args: &[Value]) -> bool {
    matches!(arg(args, 0), Value::List(_))
}

fn err_expected_object(name: &str, v: &Value) -> Error {
    Error::message(
        ErrorKind::Eval,
        format!("{name} expected object, found {}", v.human()),
    )
}
