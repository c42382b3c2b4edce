//! The explicit state container of a component.

use std::collections::BTreeSet;
use std::mem;
use std::rc::Rc;

use crate::error::ErrorKind;
use crate::{Error, Result, Value};

/// Wraps the state map of a component and records which top-level fields
/// have been written since the last update.
///
/// Writes are copy-on-write: a list or map that is shared with a render
/// tree or a captured handler is cloned before it is modified, so values
/// handed out earlier never change underneath their holder.
#[derive(Debug, Clone)]
pub struct State {
    value: Value,
    dirty: BTreeSet<String>,
}

impl State {
    /// Construct a new state container, `value` must be a map.
    pub fn new(value: Value) -> Result<Self> {
        match value {
            Value::Map(_) => Ok(Self {
                value,
                dirty: BTreeSet::new(),
            }),
            value => Err(Error::message(
                ErrorKind::Eval,
                format!("expected state to be a map, found {}", value.human()),
            )),
        }
    }

    /// The whole state map.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Looks up a dotted path, e.g. `todos.0.text`.
    ///
    /// Segments index maps by key and lists by position.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.value, |v, segment| match v {
            Value::Map(map) => map.get(segment),
            Value::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        })
    }

    /// Writes a value at a dotted path and marks the top-level field dirty.
    ///
    /// Missing maps along the path are created. A list segment must name
    /// an existing position.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::message(
                ErrorKind::Eval,
                format!("invalid state path `{path}`"),
            ));
        }
        set_path(&mut self.value, &segments, value.into(), path)?;
        self.dirty.insert(segments[0].to_owned());
        Ok(())
    }

    /// Marks a top-level field as changed without writing it.
    pub fn touch(&mut self, field: impl Into<String>) {
        self.dirty.insert(field.into());
    }

    /// Whether any field was written since the dirty set was last taken.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Hands over the set of changed top-level fields and resets it.
    pub fn take_dirty(&mut self) -> BTreeSet<String> {
        mem::take(&mut self.dirty)
    }
}

fn set_path(target: &mut Value, segments: &[&str], value: Value, path: &str) -> Result<()> {
    let (segment, rest) = match segments {
        [segment, rest @ ..] => (*segment, rest),
        [] => {
            *target = value;
            return Ok(());
        }
    };

    match target {
        Value::Map(map) => {
            let map = Rc::make_mut(map);
            let entry = map
                .entry(segment.to_owned())
                .or_insert_with(|| match rest {
                    [] => Value::None,
                    _ => Value::new_map(),
                });
            if entry.is_none() && !rest.is_empty() {
                *entry = Value::new_map();
            }
            set_path(entry, rest, value, path)
        }
        Value::List(list) => {
            let len = list.len();
            let i = segment
                .parse::<usize>()
                .ok()
                .filter(|i| *i < len)
                .ok_or_else(|| {
                    Error::message(
                        ErrorKind::Eval,
                        format!("cannot set `{path}`, `{segment}` is not an index of a list of length {len}"),
                    )
                })?;
            let list = Rc::make_mut(list);
            set_path(&mut list[i], rest, value, path)
        }
        other => Err(Error::message(
            ErrorKind::Eval,
            format!("cannot set `{path}`, cannot index into {}", other.human()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::value;

    #[test]
    fn state_new_requires_map() {
        let err = State::new(Value::from(1)).unwrap_err();
        assert_eq!(err.to_string(), "expected state to be a map, found integer");
        assert!(State::new(Value::new_map()).is_ok());
    }

    #[test]
    fn state_get_path() {
        let state = State::new(value! {
            todos: [{ text: "a" }, { text: "b" }],
            filter: "all",
        })
        .unwrap();
        assert_eq!(state.get("filter"), Some(&Value::from("all")));
        assert_eq!(state.get("todos.1.text"), Some(&Value::from("b")));
        assert_eq!(state.get("todos.2.text"), None);
        assert_eq!(state.get("filter.length"), None);
    }

    #[test]
    fn state_set_marks_top_level_dirty() {
        let mut state = State::new(value! { user: { name: "a" }, count: 1 }).unwrap();
        state.set("user.name", "b").unwrap();
        state.set("count", 2).unwrap();
        assert_eq!(state.get("user.name"), Some(&Value::from("b")));
        let dirty: Vec<_> = state.take_dirty().into_iter().collect();
        assert_eq!(dirty, ["count", "user"]);
        assert!(!state.is_dirty());
    }

    #[test]
    fn state_set_creates_missing_maps() {
        let mut state = State::new(Value::new_map()).unwrap();
        state.set("a.b.c", true).unwrap();
        assert_eq!(state.get("a.b.c"), Some(&Value::from(true)));
    }

    #[test]
    fn state_set_is_copy_on_write() {
        let mut state = State::new(value! { todos: [1, 2] }).unwrap();
        let before = state.get("todos").cloned().unwrap();
        state.set("todos.0", 9).unwrap();
        assert_eq!(before, Value::from(vec![1, 2]));
        assert_eq!(state.get("todos"), Some(&Value::from(vec![9, 2])));
    }

    #[test]
    fn state_set_err_list_index() {
        let mut state = State::new(value! { todos: [1] }).unwrap();
        let err = state.set("todos.3", 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot set `todos.3`, `3` is not an index of a list of length 1"
        );
        let err = state.set("todos.0.x", 0).unwrap_err();
        assert_eq!(err.to_string(), "cannot set `todos.0.x`, cannot index into integer");
    }
}
