//! Resolves the names in a parsed expression against the render context.
//!
//! The parser knows nothing about what an identifier refers to. The
//! rewriter walks the expression and turns every name into a [`Root`], every
//! bare call into a [`Method`][ExprKind::Method] or
//! [`Global`][ExprKind::Global] call, and records which loop variables an
//! event handler captures.

use std::collections::{BTreeMap, BTreeSet};

use crate::functions::{self, Functions};
use crate::types::ast::{Expr, ExprKind, Root, TemplatePart};
use crate::types::program::HandlerSource;
use crate::types::span::Span;
use crate::{Error, Result, Value};

pub struct Rewriter<'a> {
    source: &'a str,
    functions: &'a Functions,

    /// The loop variables in scope, innermost last.
    loop_vars: &'a [String],

    /// The parameters of the enclosing arrow function, if any.
    params: Vec<String>,

    /// The loop variables referenced so far.
    locals: BTreeSet<String>,
}

impl<'a> Rewriter<'a> {
    pub fn new(source: &'a str, functions: &'a Functions, loop_vars: &'a [String]) -> Self {
        Self {
            source,
            functions,
            loop_vars,
            params: Vec::new(),
            locals: BTreeSet::new(),
        }
    }

    /// Rewrites an expression that is evaluated for its value.
    pub fn rewrite(mut self, expr: Expr) -> Result<Expr> {
        self.expr(expr)
    }

    /// Rewrites an event handler. Unlike other expressions a handler may be
    /// an arrow function whose first parameter receives the event.
    pub fn rewrite_handler(mut self, expr: Expr) -> Result<HandlerSource> {
        let Expr { kind, span } = expr;
        let expr = match kind {
            ExprKind::Arrow { params, body } => {
                self.params = params.clone();
                let body = self.expr(*body)?;
                Expr::new(
                    ExprKind::Arrow {
                        params,
                        body: Box::new(body),
                    },
                    span,
                )
            }
            kind => self.expr(Expr::new(kind, span))?,
        };
        Ok(HandlerSource {
            expr,
            locals: self.locals.into_iter().collect(),
        })
    }

    fn expr(&mut self, expr: Expr) -> Result<Expr> {
        let Expr { kind, span } = expr;
        let kind = match kind {
            kind @ (ExprKind::Literal(_) | ExprKind::Root(_)) => kind,

            ExprKind::Template(parts) => ExprKind::Template(
                parts
                    .into_iter()
                    .map(|part| match part {
                        TemplatePart::Expr(e) => self.expr(e).map(TemplatePart::Expr),
                        part => Ok(part),
                    })
                    .collect::<Result<_>>()?,
            ),

            ExprKind::This => ExprKind::Root(Root::Instance),

            ExprKind::Ident(name) => self.ident(name),

            ExprKind::Member {
                object,
                property,
                optional: false,
            } if matches!(object.kind, ExprKind::This) => ExprKind::Root(named_root(property)),

            ExprKind::Member {
                object,
                property,
                optional,
            } => ExprKind::Member {
                object: Box::new(self.expr(*object)?),
                property,
                optional,
            },

            ExprKind::Index {
                object,
                index,
                optional,
            } => ExprKind::Index {
                object: Box::new(self.expr(*object)?),
                index: Box::new(self.expr(*index)?),
                optional,
            },

            ExprKind::Call { callee, args } => {
                let args = self.exprs(args)?;
                self.call(*callee, args)?
            }

            ExprKind::Method { name, args } => ExprKind::Method {
                name,
                args: self.exprs(args)?,
            },

            ExprKind::Global { name, args } => ExprKind::Global {
                name,
                args: self.exprs(args)?,
            },

            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(self.expr(*operand)?),
            },

            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: Box::new(self.expr(*lhs)?),
                rhs: Box::new(self.expr(*rhs)?),
            },

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => ExprKind::Conditional {
                cond: Box::new(self.expr(*cond)?),
                then: Box::new(self.expr(*then)?),
                otherwise: Box::new(self.expr(*otherwise)?),
            },

            ExprKind::Array(elems) => ExprKind::Array(self.exprs(elems)?),

            ExprKind::Object(entries) => ExprKind::Object(
                entries
                    .into_iter()
                    .map(|(k, e)| Ok((k, self.expr(e)?)))
                    .collect::<Result<_>>()?,
            ),

            ExprKind::Arrow { .. } => {
                return Err(Error::syntax(
                    "arrow functions are only allowed as event handlers",
                    self.source,
                    span,
                ));
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn ident(&mut self, name: String) -> ExprKind {
        if self.params.contains(&name) {
            return ExprKind::Root(Root::Local(name));
        }
        if self.loop_vars.contains(&name) {
            self.locals.insert(name.clone());
            return ExprKind::Root(Root::Local(name));
        }
        ExprKind::Root(named_root(name))
    }

    fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Result<ExprKind> {
        match callee.kind {
            ExprKind::Ident(name) => {
                if self.is_local(&name) {
                    return Err(Error::syntax(
                        format!("`{name}` is not a function"),
                        self.source,
                        callee.span,
                    ));
                }
                if self.functions.contains(&name) {
                    Ok(ExprKind::Global { name, args })
                } else {
                    Ok(ExprKind::Method { name, args })
                }
            }

            ExprKind::Member {
                object,
                property,
                optional: false,
            } if matches!(object.kind, ExprKind::This) => Ok(ExprKind::Method {
                name: property,
                args,
            }),

            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                if let ExprKind::Ident(ns) = &object.kind {
                    if !self.is_local(ns) && functions::is_namespace(ns) {
                        let name = format!("{ns}.{property}");
                        if self.functions.contains(&name) {
                            return Ok(ExprKind::Global { name, args });
                        }
                        return Err(Error::syntax(
                            format!("unknown function `{name}`"),
                            self.source,
                            callee.span,
                        ));
                    }
                }
                let object = self.expr(*object)?;
                let callee = Expr::new(
                    ExprKind::Member {
                        object: Box::new(object),
                        property,
                        optional,
                    },
                    callee.span,
                );
                Ok(ExprKind::Call {
                    callee: Box::new(callee),
                    args,
                })
            }

            _ => Err(Error::syntax(
                "expected function or method name",
                self.source,
                callee.span,
            )),
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name) || self.loop_vars.iter().any(|v| v == name)
    }
}

fn named_root(name: String) -> Root {
    if name == "state" {
        Root::State
    } else if name == "props" {
        Root::Props
    } else {
        Root::Field(name)
    }
}

/// Replaces references to the given loop variables with literals.
///
/// Arrow parameters shadow the loop variables of the same name.
pub fn substitute(expr: &Expr, values: &BTreeMap<String, Value>) -> Expr {
    let kind = match &expr.kind {
        ExprKind::Root(Root::Local(name)) => match values.get(name) {
            Some(value) => ExprKind::Literal(value.clone()),
            None => expr.kind.clone(),
        },
        ExprKind::Literal(_) | ExprKind::Root(_) | ExprKind::Ident(_) | ExprKind::This => {
            expr.kind.clone()
        }
        ExprKind::Template(parts) => ExprKind::Template(
            parts
                .iter()
                .map(|part| match part {
                    TemplatePart::Expr(e) => TemplatePart::Expr(substitute(e, values)),
                    part => part.clone(),
                })
                .collect(),
        ),
        ExprKind::Member {
            object,
            property,
            optional,
        } => ExprKind::Member {
            object: Box::new(substitute(object, values)),
            property: property.clone(),
            optional: *optional,
        },
        ExprKind::Index {
            object,
            index,
            optional,
        } => ExprKind::Index {
            object: Box::new(substitute(object, values)),
            index: Box::new(substitute(index, values)),
            optional: *optional,
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: Box::new(substitute(callee, values)),
            args: substitute_all(args, values),
        },
        ExprKind::Method { name, args } => ExprKind::Method {
            name: name.clone(),
            args: substitute_all(args, values),
        },
        ExprKind::Global { name, args } => ExprKind::Global {
            name: name.clone(),
            args: substitute_all(args, values),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: Box::new(substitute(operand, values)),
        },
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op: *op,
            lhs: Box::new(substitute(lhs, values)),
            rhs: Box::new(substitute(rhs, values)),
        },
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => ExprKind::Conditional {
            cond: Box::new(substitute(cond, values)),
            then: Box::new(substitute(then, values)),
            otherwise: Box::new(substitute(otherwise, values)),
        },
        ExprKind::Array(elems) => ExprKind::Array(substitute_all(elems, values)),
        ExprKind::Object(entries) => ExprKind::Object(
            entries
                .iter()
                .map(|(k, e)| (k.clone(), substitute(e, values)))
                .collect(),
        ),
        ExprKind::Arrow { params, body } => {
            let mut values = values.clone();
            values.retain(|name, _| !params.contains(name));
            ExprKind::Arrow {
                params: params.clone(),
                body: Box::new(substitute(body, &values)),
            }
        }
    };
    Expr::new(kind, expr.span)
}

fn substitute_all(exprs: &[Expr], values: &BTreeMap<String, Value>) -> Vec<Expr> {
    exprs.iter().map(|e| substitute(e, values)).collect()
}

/// Parses and rewrites the expression at `span`.
pub fn parse(
    source: &str,
    span: Span,
    functions: &Functions,
    loop_vars: &[String],
) -> Result<Expr> {
    let expr = crate::compile::expr::parse(source, span)?;
    Rewriter::new(source, functions, loop_vars).rewrite(expr)
}

/// Parses and rewrites the event handler at `span`.
pub fn parse_handler(
    source: &str,
    span: Span,
    functions: &Functions,
    loop_vars: &[String],
) -> Result<HandlerSource> {
    let expr = crate::compile::expr::parse(source, span)?;
    Rewriter::new(source, functions, loop_vars).rewrite_handler(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    fn rewrite(source: &str, loop_vars: &[&str]) -> Result<Expr> {
        let loop_vars: Vec<String> = loop_vars.iter().map(|s| s.to_string()).collect();
        parse(
            source,
            Span::from(0..source.len()),
            &Functions::new(),
            &loop_vars,
        )
    }

    fn handler(source: &str, loop_vars: &[&str]) -> Result<HandlerSource> {
        let loop_vars: Vec<String> = loop_vars.iter().map(|s| s.to_string()).collect();
        parse_handler(
            source,
            Span::from(0..source.len()),
            &Functions::new(),
            &loop_vars,
        )
    }

    #[test]
    fn rewrite_this() {
        assert_eq!(rewrite("this", &[]).unwrap().to_string(), "this");
        let e = rewrite("this.state.count + this.props.step", &[]).unwrap();
        match &e.kind {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert!(matches!(&lhs.kind, ExprKind::Member { object, .. }
                    if matches!(object.kind, ExprKind::Root(Root::State))));
                assert!(matches!(&rhs.kind, ExprKind::Member { object, .. }
                    if matches!(object.kind, ExprKind::Root(Root::Props))));
            }
            other => panic!("unexpected {other:?}"),
        }
        let e = rewrite("this.count", &[]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Root(Root::Field(f)) if f == "count"));
        let e = rewrite("this.toggle(1)", &[]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Method { name, .. } if name == "toggle"));
    }

    #[test]
    fn rewrite_bare_names() {
        let e = rewrite("state.todos", &[]).unwrap();
        assert_eq!(e.to_string(), "this.state.todos");
        let e = rewrite("filter", &[]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Root(Root::Field(f)) if f == "filter"));
    }

    #[test]
    fn rewrite_loop_vars_shadow() {
        let e = rewrite("state.name", &["state"]).unwrap();
        match &e.kind {
            ExprKind::Member { object, .. } => {
                assert!(matches!(&object.kind, ExprKind::Root(Root::Local(n)) if n == "state"))
            }
            other => panic!("unexpected {other:?}"),
        }
        let e = rewrite("todo.text", &["todo", "i"]).unwrap();
        assert_eq!(e.to_string(), "todo.text");
    }

    #[test]
    fn rewrite_calls() {
        let e = rewrite("select(todo)", &["todo"]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Method { name, .. } if name == "select"));
        let e = rewrite("Math.max(a, 1)", &[]).unwrap();
        assert_eq!(e.to_string(), "Math.max(this.a, 1)");
        assert!(matches!(&e.kind, ExprKind::Global { name, .. } if name == "Math.max"));
        let e = rewrite("String(n)", &[]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Global { name, .. } if name == "String"));
        let e = rewrite("todo.text.toUpperCase()", &["todo"]).unwrap();
        assert!(matches!(&e.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn rewrite_err_unknown_namespace_function() {
        let err = rewrite("Math.sqrt(2)", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.msg(), "unknown function `Math.sqrt`");
    }

    #[test]
    fn rewrite_err_calling_a_loop_var() {
        let err = rewrite("todo()", &["todo"]).unwrap_err();
        assert_eq!(err.msg(), "`todo` is not a function");
    }

    #[test]
    fn rewrite_err_arrow_outside_handler() {
        let err = rewrite("() => 1", &[]).unwrap_err();
        assert_eq!(
            err.msg(),
            "arrow functions are only allowed as event handlers"
        );
    }

    #[test]
    fn rewrite_handler_collects_locals() {
        let h = handler("(e) => select(e, todo, i)", &["todo", "i", "unused"]).unwrap();
        assert_eq!(h.locals, ["i", "todo"]);
        assert_eq!(h.expr.to_string(), "(e) => this.select(e, todo, i)");

        let h = handler("remove", &["todo"]).unwrap();
        assert!(h.locals.is_empty());
    }

    #[test]
    fn rewrite_handler_params_shadow_loop_vars() {
        let h = handler("(todo) => select(todo)", &["todo"]).unwrap();
        assert!(h.locals.is_empty());
    }

    #[test]
    fn substitute_index() {
        let h = handler("() => remove(i)", &["i"]).unwrap();
        let values = BTreeMap::from([(String::from("i"), Value::from(2))]);
        assert_eq!(
            substitute(&h.expr, &values).to_string(),
            "() => this.remove(2)"
        );
    }
}
