//! AST representing an embedded expression.
//!
//! The parser produces unresolved identifiers ([`ExprKind::Ident`],
//! [`ExprKind::This`], plain [`ExprKind::Call`]s). The rewriter replaces
//! these with [`Root`]s, [`ExprKind::Method`] and [`ExprKind::Global`] calls
//! so that the renderer never has to guess what a name refers to.

use std::fmt;

use crate::types::span::Span;
use crate::value::format_float;
use crate::Value;

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    Template(Vec<TemplatePart>),
    Ident(String),
    This,
    Root(Root),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// A call to an instance method.
    Method {
        name: String,
        args: Vec<Expr>,
    },
    /// A call to an allow-listed global function.
    Global {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Arrow {
        params: Vec<String>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Str(String),
    Expr(Expr),
}

/// The resolved base of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// `this`
    Instance,
    /// `state` or `this.state`
    State,
    /// `props` or `this.props`
    Props,
    /// A loop variable or an arrow function parameter.
    Local(String),
    /// An implicit instance field, looked up in state and then props.
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Nullish,
}

/// The variables bound by an `each` or `for` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopBinding {
    /// The declared parameters, in order.
    pub params: Vec<String>,
    /// The implicit index variable of a single parameter binding.
    pub index_param: Option<String>,
    /// Whether the parameters were written as `(a, b)` or `[a, b]`.
    pub is_destructured: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Arrow { .. } | ExprKind::Conditional { .. } => 0,
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary { .. } => 7,
            ExprKind::Literal(Value::Integer(i)) if *i < 0 => 7,
            ExprKind::Literal(Value::Float(f)) if f.is_sign_negative() => 7,
            _ => 8,
        }
    }
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or | Self::Nullish => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::StrictEq | Self::StrictNe => 3,
            Self::Lt | Self::Gt | Self::Le | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
        }
    }
}

impl LoopBinding {
    /// Every name this binding introduces into scope.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .chain(self.index_param.iter())
            .map(String::as_str)
    }
}

impl fmt::Display for LoopBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_destructured {
            write!(f, "({})", self.params.join(", "))
        } else {
            f.write_str(&self.params.join(", "))
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("this"),
            Self::State => f.write_str("this.state"),
            Self::Props => f.write_str("this.props"),
            Self::Local(name) => f.write_str(name),
            Self::Field(name) => write!(f, "this.{name}"),
        }
    }
}

/// Prints the expression back as source text.
///
/// The output parses to an equivalent expression, which is how inline
/// event handlers are serialized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => fmt_literal(value, f),
            ExprKind::Template(parts) => {
                f.write_str("`")?;
                for part in parts {
                    match part {
                        TemplatePart::Str(s) => {
                            let s = s
                                .replace('\\', "\\\\")
                                .replace('`', "\\`")
                                .replace("${", "\\${");
                            f.write_str(&s)?;
                        }
                        TemplatePart::Expr(e) => write!(f, "${{{e}}}")?,
                    }
                }
                f.write_str("`")
            }
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::This => f.write_str("this"),
            ExprKind::Root(root) => write!(f, "{root}"),
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                fmt_operand(object, 8, f)?;
                f.write_str(if *optional { "?." } else { "." })?;
                f.write_str(property)
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                fmt_operand(object, 8, f)?;
                if *optional {
                    f.write_str("?.")?;
                }
                write!(f, "[{index}]")
            }
            ExprKind::Call { callee, args } => {
                fmt_operand(callee, 8, f)?;
                fmt_args(args, f)
            }
            ExprKind::Method { name, args } => {
                write!(f, "this.{name}")?;
                fmt_args(args, f)
            }
            ExprKind::Global { name, args } => {
                f.write_str(name)?;
                fmt_args(args, f)
            }
            ExprKind::Unary { op, operand } => {
                f.write_str(match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::TypeOf => "typeof ",
                })?;
                fmt_operand(operand, 7, f)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                fmt_operand(lhs, p, f)?;
                write!(f, " {} ", op.as_str())?;
                fmt_operand(rhs, p + 1, f)
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                fmt_operand(cond, 1, f)?;
                write!(f, " ? {then} : {otherwise}")
            }
            ExprKind::Array(elems) => {
                f.write_str("[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            ExprKind::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, e)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(" ")?;
                    if is_plain_key(key) {
                        f.write_str(key)?;
                    } else {
                        fmt_quoted(key, f)?;
                    }
                    write!(f, ": {e}")?;
                }
                if !entries.is_empty() {
                    f.write_str(" ")?;
                }
                f.write_str("}")
            }
            ExprKind::Arrow { params, body } => {
                write!(f, "({}) => ", params.join(", "))?;
                if matches!(body.kind, ExprKind::Object(_)) {
                    write!(f, "({body})")
                } else {
                    write!(f, "{body}")
                }
            }
        }
    }
}

fn fmt_operand(expr: &Expr, min: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if expr.precedence() < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn fmt_args(args: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

fn fmt_literal(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::None => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Integer(i) => write!(f, "{i}"),
        Value::Float(n) => f.write_str(&format_float(*n)),
        Value::String(s) => fmt_quoted(s, f),
        Value::List(list) => {
            f.write_str("[")?;
            for (i, v) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_literal(v, f)?;
            }
            f.write_str("]")
        }
        Value::Map(map) => {
            f.write_str("{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str(" ")?;
                fmt_quoted(k, f)?;
                f.write_str(": ")?;
                fmt_literal(v, f)?;
            }
            if !map.is_empty() {
                f.write_str(" ")?;
            }
            f.write_str("}")
        }
    }
}

fn fmt_quoted(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(kind: ExprKind) -> Box<Expr> {
        Box::new(Expr::new(kind, Span::at(0)))
    }

    #[test]
    fn expr_display_parenthesizes_by_precedence() {
        let sum = ExprKind::Binary {
            op: BinaryOp::Add,
            lhs: e(ExprKind::Root(Root::Local("a".into()))),
            rhs: e(ExprKind::Literal(Value::Integer(1))),
        };
        let product = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Mul,
                lhs: e(sum),
                rhs: e(ExprKind::Literal(Value::Integer(2))),
            },
            Span::at(0),
        );
        assert_eq!(product.to_string(), "(a + 1) * 2");
    }

    #[test]
    fn expr_display_roots_and_calls() {
        let call = Expr::new(
            ExprKind::Method {
                name: "remove".into(),
                args: vec![
                    *e(ExprKind::Literal(Value::Integer(2))),
                    *e(ExprKind::Root(Root::Field("todos".into()))),
                    *e(ExprKind::Literal(Value::from("a \"b\""))),
                ],
            },
            Span::at(0),
        );
        assert_eq!(call.to_string(), r#"this.remove(2, this.todos, "a \"b\"")"#);
    }

    #[test]
    fn loop_binding_names() {
        let binding = LoopBinding {
            params: vec!["todo".into()],
            index_param: Some("index".into()),
            is_destructured: false,
        };
        assert_eq!(binding.names().collect::<Vec<_>>(), ["todo", "index"]);
    }
}
