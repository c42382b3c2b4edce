use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::functions::{methods, Functions};
use crate::render::stack::Scope;
use crate::render::MethodFn;
use crate::state::State;
use crate::types::ast::{BinaryOp, Expr, ExprKind, Root, TemplatePart, UnaryOp};
use crate::types::span::Span;
use crate::value::{self, Map};
use crate::{Error, Result, Value};

/// Everything an expression can read while it is evaluated.
pub struct Env<'a> {
    /// The source the expression spans point into.
    pub source: &'a str,
    pub functions: &'a Functions,
    pub state: &'a mut State,
    pub props: &'a Value,
    pub methods: &'a BTreeMap<String, Rc<MethodFn>>,
    pub scope: &'a Scope,
}

impl Env<'_> {
    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),

            ExprKind::Template(parts) => {
                let mut s = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Str(text) => s.push_str(text),
                        TemplatePart::Expr(e) => s.push_str(&self.eval(e)?.to_js_string()),
                    }
                }
                Ok(Value::String(s))
            }

            ExprKind::Root(root) => self.root(root, expr.span),

            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                Ok(self.chain(expr)?.unwrap_or_default())
            }

            ExprKind::Method { name, args } => {
                let args = self.eval_all(args)?;
                self.call_method(name, &args, expr.span)
            }

            ExprKind::Global { name, args } => {
                let args = self.eval_all(args)?;
                let f = self.functions.get(name).ok_or_else(|| {
                    Error::eval(format!("unknown function `{name}`"), self.source, expr.span)
                })?;
                f(&args).map_err(|err| err.enrich(self.source, expr.span))
            }

            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!v.is_truthy()),
                    UnaryOp::Neg => value::number(-v.to_number()),
                    UnaryOp::Plus => value::number(v.to_number()),
                    UnaryOp::TypeOf => Value::from(v.type_of()),
                })
            }

            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }

            ExprKind::Array(elems) => Ok(Value::List(Rc::new(self.eval_all(elems)?))),

            ExprKind::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, e) in entries {
                    map.insert(key.clone(), self.eval(e)?);
                }
                Ok(Value::Map(Rc::new(map)))
            }

            ExprKind::Arrow { .. } => Err(Error::eval(
                "arrow functions can only be used as event handlers",
                self.source,
                expr.span,
            )),

            ExprKind::Ident(_) | ExprKind::This => {
                panic!("expression was not rewritten before evaluation")
            }
        }
    }

    /// Runs an event handler.
    ///
    /// An arrow function receives the event as its first parameter, a bare
    /// method name is called with the event, anything else is evaluated.
    pub fn invoke(&mut self, expr: &Expr, event: Value) -> Result<Value> {
        match &expr.kind {
            ExprKind::Arrow { params, body } => {
                let mut scope = self.scope.clone();
                let mut event = Some(event);
                for param in params {
                    scope.push(param, event.take().unwrap_or_default(), false);
                }
                Env {
                    source: self.source,
                    functions: self.functions,
                    state: &mut *self.state,
                    props: self.props,
                    methods: self.methods,
                    scope: &scope,
                }
                .eval(body)
            }
            ExprKind::Root(Root::Field(name)) if self.methods.contains_key(name) => {
                self.call_method(name, &[event], expr.span)
            }
            _ => self.eval(expr),
        }
    }

    fn root(&self, root: &Root, span: Span) -> Result<Value> {
        match root {
            Root::State => Ok(self.state.value().clone()),
            Root::Props => Ok(self.props.clone()),
            Root::Instance => {
                let mut map = self.props.as_map().cloned().unwrap_or_default();
                if let Some(state) = self.state.value().as_map() {
                    for (k, v) in state {
                        map.insert(k.clone(), v.clone());
                    }
                }
                Ok(Value::Map(Rc::new(map)))
            }
            Root::Local(name) => match self.scope.lookup(name) {
                Some(var) => Ok(var.value.clone()),
                None => Err(self.err_not_defined(name, span)),
            },
            Root::Field(name) => match self
                .state
                .value()
                .get(name)
                .or_else(|| self.props.get(name))
            {
                Some(value) => Ok(value.clone()),
                None => Err(self.err_not_defined(name, span)),
            },
        }
    }

    /// Evaluates a member access, index or call.
    ///
    /// Returns `None` when an optional access short-circuits the rest of the
    /// chain, e.g. `todo?.user.name` when `todo` is `null`.
    fn chain(&mut self, expr: &Expr) -> Result<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let object = match self.chain(object)? {
                    Some(v) if !(*optional && v.is_none()) => v,
                    _ => return Ok(None),
                };
                self.member(&object, property, expr.span).map(Some)
            }

            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                let object = match self.chain(object)? {
                    Some(v) if !(*optional && v.is_none()) => v,
                    _ => return Ok(None),
                };
                let index = self.eval(index)?;
                self.index(&object, &index, expr.span).map(Some)
            }

            ExprKind::Call { callee, args } => match &callee.kind {
                ExprKind::Member {
                    object,
                    property,
                    optional,
                } => {
                    let object = match self.chain(object)? {
                        Some(v) if !(*optional && v.is_none()) => v,
                        _ => return Ok(None),
                    };
                    if object.is_none() {
                        return Err(Error::eval(
                            format!("cannot call `{property}` on null"),
                            self.source,
                            callee.span,
                        ));
                    }
                    let args = self.eval_all(args)?;
                    methods::call(&object, property, &args)
                        .map(Some)
                        .map_err(|err| err.enrich(self.source, callee.span))
                }
                _ => Err(Error::eval(
                    "expected function or method name",
                    self.source,
                    callee.span,
                )),
            },

            _ => self.eval(expr).map(Some),
        }
    }

    fn member(&self, object: &Value, property: &str, span: Span) -> Result<Value> {
        match object {
            Value::None => Err(Error::eval(
                format!("cannot read property `{property}` of null"),
                self.source,
                span,
            )),
            Value::Map(map) => Ok(map.get(property).cloned().unwrap_or_default()),
            v => Ok(methods::property(v, property).unwrap_or_default()),
        }
    }

    fn index(&self, object: &Value, index: &Value, span: Span) -> Result<Value> {
        let position = match index {
            Value::Integer(i) => usize::try_from(*i).ok(),
            Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
            _ => None,
        };
        let value = match (object, position) {
            (Value::None, _) => {
                return Err(Error::eval(
                    format!("cannot read index `{}` of null", index.to_js_string()),
                    self.source,
                    span,
                ))
            }
            (Value::Map(map), _) => map.get(&*index.to_js_string()).cloned(),
            (Value::List(list), Some(i)) => list.get(i).cloned(),
            (Value::String(s), Some(i)) => s.chars().nth(i).map(|c| Value::from(c.to_string())),
            (v, None) => match index {
                Value::String(name) => methods::property(v, name),
                _ => None,
            },
            _ => None,
        };
        Ok(value.unwrap_or_default())
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let a = self.eval(lhs)?;
        match op {
            BinaryOp::And if !a.is_truthy() => return Ok(a),
            BinaryOp::Or if a.is_truthy() => return Ok(a),
            BinaryOp::Nullish if !a.is_none() => return Ok(a),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => return self.eval(rhs),
            _ => {}
        }
        let b = self.eval(rhs)?;
        let value = match op {
            BinaryOp::Add if is_stringish(&a) || is_stringish(&b) => {
                Value::String(format!("{}{}", a.to_js_string(), b.to_js_string()))
            }
            BinaryOp::Add => value::number(a.to_number() + b.to_number()),
            BinaryOp::Sub => value::number(a.to_number() - b.to_number()),
            BinaryOp::Mul => value::number(a.to_number() * b.to_number()),
            BinaryOp::Div => value::number(a.to_number() / b.to_number()),
            BinaryOp::Rem => value::number(a.to_number() % b.to_number()),
            BinaryOp::Lt => Value::Bool(compare(&a, &b) == Some(Ordering::Less)),
            BinaryOp::Gt => Value::Bool(compare(&a, &b) == Some(Ordering::Greater)),
            BinaryOp::Le => Value::Bool(matches!(
                compare(&a, &b),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::Ge => Value::Bool(matches!(
                compare(&a, &b),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::Eq => Value::Bool(value::loose_eq(&a, &b)),
            BinaryOp::Ne => Value::Bool(!value::loose_eq(&a, &b)),
            BinaryOp::StrictEq => Value::Bool(value::strict_eq(&a, &b)),
            BinaryOp::StrictNe => Value::Bool(!value::strict_eq(&a, &b)),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => unreachable!(),
        };
        Ok(value)
    }

    fn call_method(&mut self, name: &str, args: &[Value], span: Span) -> Result<Value> {
        let f = self.methods.get(name).ok_or_else(|| {
            Error::eval(format!("unknown method `{name}`"), self.source, span)
        })?;
        f(&mut *self.state, args).map_err(|err| err.enrich(self.source, span))
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn err_not_defined(&self, name: &str, span: Span) -> Error {
        Error::eval(format!("`{name}` is not defined"), self.source, span)
    }
}

fn is_stringish(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::List(_) | Value::Map(_))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compile::rewrite;
    use crate::error::ErrorKind;
    use crate::value;

    struct Fixture {
        functions: Functions,
        state: State,
        props: Value,
        methods: BTreeMap<String, Rc<MethodFn>>,
        scope: Scope,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scope = Scope::default();
            scope.push("todo", value! { text: "Write docs", done: false }, false);
            scope.push("index", Value::from(2), true);
            let mut methods: BTreeMap<String, Rc<MethodFn>> = BTreeMap::new();
            methods.insert(
                "bump".into(),
                Rc::new(|state: &mut State, args: &[Value]| -> Result<Value> {
                    let n = state.get("count").map_or(0.0, Value::to_number);
                    let by = args.first().map_or(1.0, Value::to_number);
                    state.set("count", value::number(n + by))?;
                    Ok(Value::None)
                }),
            );
            Self {
                functions: Functions::new(),
                state: State::new(value! {
                    count: 3,
                    todos: ["a", "b"],
                    user: { name: "Ada" },
                    empty: None,
                })
                .unwrap(),
                props: value! { title: "Todos", count: 100 },
                methods,
                scope,
            }
        }

        fn parse(&self, source: &str) -> Expr {
            let loop_vars = vec!["todo".to_owned(), "index".to_owned()];
            rewrite::parse(
                source,
                Span::from(0..source.len()),
                &self.functions,
                &loop_vars,
            )
            .unwrap()
        }

        fn eval(&mut self, source: &str) -> Result<Value> {
            let expr = self.parse(source);
            Env {
                source,
                functions: &self.functions,
                state: &mut self.state,
                props: &self.props,
                methods: &self.methods,
                scope: &self.scope,
            }
            .eval(&expr)
        }
    }

    #[test]
    fn eval_fields_state_before_props() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("count").unwrap(), Value::from(3));
        assert_eq!(f.eval("this.title").unwrap(), Value::from("Todos"));
        assert_eq!(f.eval("props.count").unwrap(), Value::from(100));
        assert_eq!(f.eval("this.state.user.name").unwrap(), Value::from("Ada"));
        assert_eq!(f.eval("state['count']").unwrap(), Value::from(3));
        assert_eq!(f.eval("this.count").unwrap(), Value::from(3));
    }

    #[test]
    fn eval_locals() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("todo.text").unwrap(), Value::from("Write docs"));
        assert_eq!(f.eval("index + 1").unwrap(), Value::from(3));
        assert_eq!(f.eval("todos[index - 1]").unwrap(), Value::from("b"));
    }

    #[test]
    fn eval_arithmetic_and_strings() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("count * 2 - 1").unwrap(), Value::from(5));
        assert_eq!(f.eval("count / 2").unwrap(), Value::from(1.5));
        assert_eq!(f.eval("'n=' + count").unwrap(), Value::from("n=3"));
        assert_eq!(f.eval("todos + ''").unwrap(), Value::from("a,b"));
        assert_eq!(
            f.eval("`${count} item${count === 1 ? '' : 's'} left`").unwrap(),
            Value::from("3 items left")
        );
        assert!(matches!(f.eval("1 / 0").unwrap(), Value::Float(v) if v.is_infinite()));
    }

    #[test]
    fn eval_logic_and_comparison() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("empty ?? 'none'").unwrap(), Value::from("none"));
        assert_eq!(f.eval("0 || 'x'").unwrap(), Value::from("x"));
        assert_eq!(f.eval("count && 'y'").unwrap(), Value::from("y"));
        assert_eq!(f.eval("'a' < 'b'").unwrap(), Value::from(true));
        assert_eq!(f.eval("count >= 3").unwrap(), Value::from(true));
        assert_eq!(f.eval("count == '3'").unwrap(), Value::from(true));
        assert_eq!(f.eval("count === '3'").unwrap(), Value::from(false));
        assert_eq!(f.eval("!todo.done").unwrap(), Value::from(true));
        assert_eq!(f.eval("typeof todos").unwrap(), Value::from("object"));
    }

    #[test]
    fn eval_optional_chain_short_circuits() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("empty?.user.name").unwrap(), Value::None);
        assert_eq!(f.eval("user.missing").unwrap(), Value::None);
        let err = f.eval("empty.name").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot read property `name` of null between bytes 0 and 10"
        );
    }

    #[test]
    fn eval_value_methods_and_globals() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("todo.text.toUpperCase()").unwrap(), Value::from("WRITE DOCS"));
        assert_eq!(f.eval("todos.length").unwrap(), Value::from(2));
        assert_eq!(f.eval("todos.join(' & ')").unwrap(), Value::from("a & b"));
        assert_eq!(f.eval("Math.max(count, 7)").unwrap(), Value::from(7));
        assert_eq!(f.eval("String(count) + 1").unwrap(), Value::from("31"));
        assert_eq!(
            f.eval("Object.keys(user)").unwrap(),
            Value::from(vec!["name"])
        );
    }

    #[test]
    fn eval_objects_and_arrays() {
        let mut f = Fixture::new();
        let v = f.eval("{ n: count, list: [1, todo.done] }").unwrap();
        assert_eq!(v, value! { n: 3, list: [1, false] });
    }

    #[test]
    fn eval_instance_method() {
        let mut f = Fixture::new();
        assert_eq!(f.eval("bump(2)").unwrap(), Value::None);
        assert_eq!(f.state.get("count"), Some(&Value::from(5)));
        assert!(f.state.is_dirty());
    }

    #[test]
    fn eval_err_not_defined() {
        let mut f = Fixture::new();
        let err = f.eval("missing + 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eval);
        assert_eq!(err.to_string(), "`missing` is not defined between bytes 0 and 7");
    }

    #[test]
    fn eval_err_unknown_method() {
        let mut f = Fixture::new();
        let err = f.eval("nope()").unwrap_err();
        assert_eq!(err.to_string(), "unknown method `nope` between bytes 0 and 6");
        let err = f.eval("count.nope()").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eval);
        assert_eq!(err.span(), Some((0, 10)));
    }

    #[test]
    fn invoke_shapes() {
        let mut f = Fixture::new();
        for (source, event) in [
            ("(e) => bump(e)", Value::from(10)),
            ("bump", Value::from(100)),
            ("this.bump", Value::from(1000)),
            ("bump(index)", Value::None),
        ] {
            let handler = rewrite::parse_handler(
                source,
                Span::from(0..source.len()),
                &f.functions,
                &["index".to_owned()],
            )
            .unwrap();
            Env {
                source,
                functions: &f.functions,
                state: &mut f.state,
                props: &f.props,
                methods: &f.methods,
                scope: &f.scope,
            }
            .invoke(&handler.expr, event)
            .unwrap();
        }
        assert_eq!(f.state.get("count"), Some(&Value::from(1115)));
    }
}
