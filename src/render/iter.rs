use std::rc::Rc;

use crate::render::stack::Scope;
use crate::types::ast::LoopBinding;
use crate::types::span::Span;
use crate::value::{List, Map};
use crate::{Error, Result, Value};

/// The state of a loop that is being rendered.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct LoopState {
    items: Items,
    /// The position of the next item.
    next: usize,
    /// The length of the scope when the loop started.
    base: usize,
}

#[cfg_attr(internal_debug, derive(Debug))]
enum Items {
    List(Rc<List>),
    Map(Rc<Map>),
    Empty,
}

impl LoopState {
    /// Starts a loop over the given collection.
    ///
    /// `null` iterates zero times, any other value that is not a list or a
    /// map is an error.
    pub fn new(source: &str, collection: Value, span: Span, scope: &Scope) -> Result<Self> {
        let items = match collection {
            Value::List(list) => Items::List(list),
            Value::Map(map) => Items::Map(map),
            Value::None => Items::Empty,
            value => {
                return Err(Error::eval(
                    format!(
                        "expected iterable, but expression evaluated to {}",
                        value.human()
                    ),
                    source,
                    span,
                ))
            }
        };
        Ok(Self::with_items(items, scope))
    }

    /// A loop with nothing to iterate, used when the collection failed to
    /// evaluate.
    pub fn empty(scope: &Scope) -> Self {
        Self::with_items(Items::Empty, scope)
    }

    fn with_items(items: Items, scope: &Scope) -> Self {
        Self {
            items,
            next: 0,
            base: scope.len(),
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Binds the next item into the scope, returns false when the loop is
    /// done.
    ///
    /// The binding is decided by the shape of the collection:
    /// - list `x`: the value, plus the implicit index
    /// - list `(x, i)`: the value and the index
    /// - list `(k, x, i)`: the position, the value and the index
    /// - map `x`: the value, plus the implicit index
    /// - map `(k, x)`: the key and the value
    /// - map `(k, x, i)`: the key, the value and the index
    ///
    /// Parameters beyond the third are bound to `null`.
    pub fn iterate(&mut self, binding: &LoopBinding, scope: &mut Scope) -> bool {
        let i = self.next;
        let (key, value) = match &self.items {
            Items::List(list) => match list.get(i) {
                Some(value) => (None, value.clone()),
                None => return false,
            },
            Items::Map(map) => match map.get_index(i) {
                Some((key, value)) => (Some(key.clone()), value.clone()),
                None => return false,
            },
            Items::Empty => return false,
        };
        self.next += 1;

        scope.truncate(self.base);
        let index = Value::from(i);
        let params = &binding.params;
        match (params.len(), key) {
            (1, _) => {
                scope.push(&params[0], value, false);
                if let Some(name) = &binding.index_param {
                    scope.push(name, index, true);
                }
            }
            (2, None) => {
                scope.push(&params[0], value, false);
                scope.push(&params[1], index, true);
            }
            (2, Some(key)) => {
                scope.push(&params[0], Value::String(key), false);
                scope.push(&params[1], value, false);
            }
            (_, key) => {
                match key {
                    Some(key) => scope.push(&params[0], Value::String(key), false),
                    None => scope.push(&params[0], index.clone(), true),
                }
                scope.push(&params[1], value, false);
                scope.push(&params[2], index, true);
                for extra in &params[3..] {
                    scope.push(extra, Value::None, false);
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::value;

    fn binding(params: &[&str], index: Option<&str>) -> LoopBinding {
        LoopBinding {
            params: params.iter().map(|p| p.to_string()).collect(),
            index_param: index.map(String::from),
            is_destructured: params.len() > 1,
        }
    }

    fn collect(collection: Value, binding: &LoopBinding) -> Vec<Vec<(String, Value, bool)>> {
        let mut scope = Scope::default();
        let mut state = LoopState::new("x", collection, Span::from(0..1), &scope).unwrap();
        let mut out = Vec::new();
        while state.iterate(binding, &mut scope) {
            let vars = binding
                .names()
                .filter_map(|name| scope.lookup(name))
                .map(|v| (v.name.clone(), v.value.clone(), v.is_index))
                .collect();
            out.push(vars);
        }
        out
    }

    #[test]
    fn iterate_list_single_param() {
        let out = collect(Value::from(vec!["a", "b"]), &binding(&["item"], Some("index")));
        assert_eq!(
            out,
            [
                vec![
                    ("item".into(), Value::from("a"), false),
                    ("index".into(), Value::from(0), true)
                ],
                vec![
                    ("item".into(), Value::from("b"), false),
                    ("index".into(), Value::from(1), true)
                ],
            ]
        );
    }

    #[test]
    fn iterate_two_params_by_shape() {
        let b = binding(&["a", "b"], None);
        let out = collect(Value::from(vec!["x"]), &b);
        assert_eq!(
            out,
            [vec![("a".into(), Value::from("x"), false), ("b".into(), Value::from(0), true)]]
        );
        let out = collect(value! { k: 1 }, &b);
        assert_eq!(
            out,
            [vec![("a".into(), Value::from("k"), false), ("b".into(), Value::from(1), false)]]
        );
    }

    #[test]
    fn iterate_three_params() {
        let b = binding(&["k", "v", "i", "extra"], None);
        let out = collect(value! { a: true, b: false }, &b);
        assert_eq!(out[1][0], ("k".into(), Value::from("b"), false));
        assert_eq!(out[1][2], ("i".into(), Value::from(1), true));
        assert_eq!(out[1][3], ("extra".into(), Value::None, false));

        let out = collect(Value::from(vec![5]), &b);
        assert_eq!(out[0][0], ("k".into(), Value::from(0), true));
    }

    #[test]
    fn iterate_map_single_param_binds_value() {
        let out = collect(value! { a: 1 }, &binding(&["v"], Some("index")));
        assert_eq!(out[0][0], ("v".into(), Value::from(1), false));
    }

    #[test]
    fn iterate_null_and_empty() {
        let b = binding(&["x"], Some("index"));
        assert!(collect(Value::None, &b).is_empty());
        assert!(collect(Value::from(Vec::<i32>::new()), &b).is_empty());
    }

    #[test]
    fn iterate_err_not_iterable() {
        let err = LoopState::new("x", Value::from(1), Span::from(0..1), &Scope::default())
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "expected iterable, but expression evaluated to integer between bytes 0 and 1"
        );
    }

    #[test]
    fn iterate_restores_scope_base() {
        let mut scope = Scope::default();
        scope.push("outer", Value::None, false);
        let b = binding(&["x"], Some("index"));
        let mut state =
            LoopState::new("x", Value::from(vec![1, 2]), Span::from(0..1), &scope).unwrap();
        assert!(state.iterate(&b, &mut scope));
        assert!(state.iterate(&b, &mut scope));
        assert_eq!(scope.len(), 3);
        assert!(!state.iterate(&b, &mut scope));
        scope.truncate(state.base());
        assert_eq!(scope.len(), 1);
    }
}
