//! Fixtures shared by the benchmarks.

pub mod context;
#[cfg(test)]
mod tests;

use strand::{Context, State, Value};

/// The todo list component in the primary syntax.
pub const TODOS: &str = include_str!("../benchdata/todos.html");

/// The same component in the double brace dialect.
pub const TODOS_LEGACY: &str = include_str!("../benchdata/todos-legacy.html");

/// The todo list state as a JSON document.
pub const STATE_JSON: &str = include_str!("../benchdata/state.json");

/// Parses a JSON document into state.
pub fn from_json(json: &str) -> Value {
    let json: serde_json::Value = serde_json::from_str(json).unwrap();
    Value::from(json)
}

/// Builds a context for the todo list with its methods registered.
pub fn context(state: &context::State) -> Context {
    with_methods(strand::to_value(state).unwrap())
}

/// Builds a context from already converted state.
pub fn with_methods(state: Value) -> Context {
    let mut ctx = Context::new(state, Value::None).unwrap();
    ctx.add_method("edit", |state: &mut State, args: &[Value]| {
        state.set("draft", args.first().cloned().unwrap_or_default())
    });
    ctx.add_method("toggle", |state: &mut State, args: &[Value]| {
        let i = match args.first() {
            Some(Value::Integer(i)) => *i,
            _ => return Err(strand::Error::from("expected an index")),
        };
        let path = format!("todos.{i}.done");
        let done = matches!(state.get(&path), Some(Value::Bool(true)));
        state.set(&path, !done)
    });
    ctx.add_method("remove", |state: &mut State, args: &[Value]| {
        let todo = args.get(1).cloned().unwrap_or_default();
        let todos: Vec<Value> = state
            .get("todos")
            .and_then(Value::as_list)
            .map(|todos| todos.iter().filter(|t| !t.ptr_eq(&todo)).cloned().collect())
            .unwrap_or_default();
        state.set("todos", todos)
    });
    ctx.add_method("clear", |state: &mut State, _: &[Value]| {
        state.set("todos", Vec::<Value>::new())
    });
    ctx
}

pub fn repeat(source: &str, n: usize) -> String {
    let mut s = String::new();
    for _ in 0..n {
        s.push_str(source);
    }
    s
}
