//! Global functions that templates are allowed to call.
//!
//! An expression can only call a function that is registered here, either
//! by bare name (`String(count)`) or through one of the known namespaces
//! (`Math.max(a, b)`). Any other bare call is an instance method.

#[cfg(feature = "builtins")]
pub mod builtins;
pub(crate) mod methods;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::{Error, Result, Value};

/// Namespaces whose members can be called as global functions.
pub const NAMESPACES: &[&str] = &["Math", "JSON", "Object", "Array", "Number", "String"];

pub type FunctionFn = dyn Fn(&[Value]) -> Result<Value> + 'static;

/// Wraps a function into the boxed form stored by the engine.
pub fn new<F, R>(f: F) -> Rc<FunctionFn>
where
    F: Fn(&[Value]) -> R + 'static,
    R: FunctionReturn,
{
    Rc::new(move |args: &[Value]| -> Result<Value> { f(args).to_value() })
}

/// The return type of a global function.
///
/// Implemented for any `R` where `R` implements `Into<Value>` and for
/// `Result<R, E>` where `E` implements `Into<Error>`. Since
/// `Option<R>` converts into a [`Value`], returning `None` renders as
/// `null`.
pub trait FunctionReturn {
    fn to_value(self) -> Result<Value>;
}

impl<T> FunctionReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T, E> FunctionReturn for std::result::Result<T, E>
where
    T: Into<Value>,
    E: Into<Error>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into).map_err(Into::into)
    }
}

/// The set of global functions available to templates compiled by an
/// engine.
#[derive(Clone, Default)]
pub struct Functions {
    map: BTreeMap<String, Rc<FunctionFn>>,
}

impl Functions {
    /// Construct a set with no functions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct a set with the builtin functions, if enabled.
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut functions = Self::empty();
        #[cfg(feature = "builtins")]
        builtins::register(&mut functions);
        functions
    }

    pub fn insert(&mut self, name: impl Into<String>, f: Rc<FunctionFn>) {
        self.map.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FunctionFn> {
        self.map.get(name).map(|f| &**f)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

pub fn is_namespace(name: &str) -> bool {
    NAMESPACES.contains(&name)
}

/// Returns the argument at the given position, or `null` if it was not
/// passed.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functions_insert_and_call() {
        let mut functions = Functions::empty();
        functions.insert("double", new(|args: &[Value]| arg(args, 0).to_number() * 2.0));
        functions.insert(
            "fail",
            new(|_: &[Value]| -> std::result::Result<i64, String> { Err("nope".into()) }),
        );
        assert!(functions.contains("double"));
        assert!(!functions.contains("triple"));

        let double = functions.get("double").unwrap();
        assert_eq!(double(&[Value::from(4)]).unwrap(), Value::from(8.0));

        let err = functions.get("fail").unwrap()(&[]).unwrap_err();
        assert_eq!(err.msg(), "nope");
    }

    #[test]
    fn functions_option_return_is_null() {
        let mut functions = Functions::empty();
        functions.insert("first", new(|args: &[Value]| args.first().cloned()));
        let first = functions.get("first").unwrap();
        assert_eq!(first(&[]).unwrap(), Value::None);
    }

    #[test]
    fn namespaces() {
        assert!(is_namespace("Math"));
        assert!(is_namespace("JSON"));
        assert!(!is_namespace("Date"));
    }
}
