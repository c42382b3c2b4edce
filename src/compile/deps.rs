//! Works out which top-level state fields each render action reads.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::ast::{Expr, ExprKind, Root, TemplatePart};
use crate::types::program::{Action, ActionId};
use crate::Value;

/// The state fields an expression reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reads {
    pub fields: BTreeSet<String>,
    /// Whether the whole state is read, so any change is relevant.
    pub any: bool,
}

impl Reads {
    pub fn of(expr: &Expr) -> Self {
        let mut reads = Self::default();
        reads.collect(expr);
        reads
    }

    fn collect(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Root(Root::Field(name)) => {
                self.fields.insert(name.clone());
            }
            ExprKind::Root(Root::State | Root::Instance) => self.any = true,
            ExprKind::Root(Root::Props | Root::Local(_)) => {}
            ExprKind::Literal(_) | ExprKind::Ident(_) => {}
            ExprKind::This => self.any = true,

            ExprKind::Member {
                object, property, ..
            } => match &object.kind {
                ExprKind::Root(Root::State) => {
                    self.fields.insert(property.clone());
                }
                _ => self.collect(object),
            },

            ExprKind::Index { object, index, .. } => {
                match (&object.kind, &index.kind) {
                    (ExprKind::Root(Root::State), ExprKind::Literal(Value::String(key))) => {
                        self.fields.insert(key.clone());
                    }
                    (ExprKind::Root(Root::State), ExprKind::Literal(Value::Integer(i))) => {
                        self.fields.insert(i.to_string());
                    }
                    _ => self.collect(object),
                }
                self.collect(index);
            }

            ExprKind::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(e) = part {
                        self.collect(e);
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                self.collect(callee);
                self.collect_all(args);
            }
            ExprKind::Method { args, .. } | ExprKind::Global { args, .. } => {
                self.collect_all(args)
            }
            ExprKind::Unary { operand, .. } => self.collect(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.collect(lhs);
                self.collect(rhs);
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.collect(cond);
                self.collect(then);
                self.collect(otherwise);
            }
            ExprKind::Array(elems) => self.collect_all(elems),
            ExprKind::Object(entries) => {
                for (_, e) in entries {
                    self.collect(e);
                }
            }
            ExprKind::Arrow { body, .. } => self.collect(body),
        }
    }

    fn collect_all(&mut self, exprs: &[Expr]) {
        for e in exprs {
            self.collect(e);
        }
    }
}

/// Maps each state field to the render actions that depend on it.
///
/// Built once per template. Use [`actions_for`][DependencyMap::actions_for]
/// to find the actions to re-run after a change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    fields: BTreeMap<String, Vec<ActionId>>,
    any: Vec<ActionId>,
}

impl DependencyMap {
    pub(crate) fn build(actions: &[Action]) -> Self {
        let mut map = Self::default();
        for (i, action) in actions.iter().enumerate() {
            let id = ActionId(i);
            for field in &action.fields {
                map.fields.entry(field.clone()).or_default().push(id);
            }
            if action.any {
                map.any.push(id);
            }
        }
        map
    }

    /// Returns the sorted, deduplicated actions that read any of the given
    /// fields.
    ///
    /// Actions that read the whole state are included whenever at least one
    /// field changed.
    pub fn actions_for<I, S>(&self, fields: I) -> Vec<ActionId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        let mut changed = false;
        for field in fields {
            changed = true;
            if let Some(actions) = self.fields.get(field.as_ref()) {
                ids.extend(actions.iter().copied());
            }
        }
        if changed {
            ids.extend(self.any.iter().copied());
        }
        ids.into_iter().collect()
    }

    /// Returns the actions that depend on the given field.
    pub fn get(&self, field: &str) -> &[ActionId] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the actions that depend on the whole state.
    pub fn any(&self) -> &[ActionId] {
        &self.any
    }

    /// Iterates over every field and its actions, ordered by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ActionId])> {
        self.fields
            .iter()
            .map(|(field, ids)| (field.as_str(), ids.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.any.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compile::rewrite;
    use crate::functions::Functions;
    use crate::types::program::ActionKind;
    use crate::types::span::Span;

    fn reads(source: &str, loop_vars: &[&str]) -> Reads {
        let loop_vars: Vec<String> = loop_vars.iter().map(|s| s.to_string()).collect();
        let expr = rewrite::parse(
            source,
            Span::from(0..source.len()),
            &Functions::new(),
            &loop_vars,
        )
        .unwrap();
        Reads::of(&expr)
    }

    fn fields(reads: &Reads) -> Vec<&str> {
        reads.fields.iter().map(String::as_str).collect()
    }

    #[test]
    fn reads_state_fields() {
        let r = reads("state.todos.length + this.state.count", &[]);
        assert_eq!(fields(&r), ["count", "todos"]);
        assert!(!r.any);

        let r = reads(r#"state["filter"] === 'all'"#, &[]);
        assert_eq!(fields(&r), ["filter"]);
    }

    #[test]
    fn reads_implicit_fields() {
        let r = reads("this.count > limit ? label : ''", &[]);
        assert_eq!(fields(&r), ["count", "label", "limit"]);
    }

    #[test]
    fn reads_ignore_locals_and_props() {
        let r = reads("todo.done && props.show", &["todo"]);
        assert!(r.fields.is_empty());
        assert!(!r.any);
    }

    #[test]
    fn reads_method_arguments() {
        let r = reads("format(price, currency)", &[]);
        assert_eq!(fields(&r), ["currency", "price"]);
    }

    #[test]
    fn reads_any() {
        assert!(reads("JSON.stringify(state)", &[]).any);
        assert!(reads("state[key]", &[]).any);
        assert_eq!(fields(&reads("state[key]", &[])), ["key"]);
        assert!(reads("this", &[]).any);
    }

    #[test]
    fn dependency_map_actions_for() {
        let action = |fields: &[&str], any: bool| Action {
            kind: ActionKind::Text,
            span: Span::from(0..0),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            any,
        };
        let map = DependencyMap::build(&[
            action(&["count"], false),
            action(&["todos", "filter"], false),
            action(&[], true),
            action(&["todos"], false),
        ]);
        assert_eq!(map.actions_for(["todos"]), [ActionId(1), ActionId(2), ActionId(3)]);
        assert_eq!(
            map.actions_for(["filter", "todos"]),
            [ActionId(1), ActionId(2), ActionId(3)]
        );
        assert_eq!(map.actions_for(["count"]), [ActionId(0), ActionId(2)]);
        assert_eq!(map.actions_for(["unused"]), [ActionId(2)]);
        assert!(map.actions_for(Vec::<String>::new()).is_empty());
        assert_eq!(map.get("todos"), [ActionId(1), ActionId(3)]);
        assert_eq!(map.any(), [ActionId(2)]);
    }
}
