//! Abstract syntax tree for class definitions and method bodies.
//!
//! Nodes own their children through `Box`/`Vec`, so dropping a class
//! definition frees the whole tree. Every expression carries a [`Span`].
//!
//! # Precedence encoding
//!
//! Distinct node variants for each message tier:
//! - [`ExprKind::UnaryMessage`]: highest precedence
//! - [`ExprKind::BinaryMessage`]: one level, left-associative
//! - [`ExprKind::KeywordMessage`]: lowest precedence

use std::fmt;

use crate::span::Span;

/// Compile-time constant, also the element type of literal arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    String(String),
    Symbol(String),
    /// `#( ... )`
    Array(Vec<Literal>),
    Nil,
    True,
    False,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Receiver, selector and arguments of a message node.
    pub fn as_send(&self) -> Option<(&Expr, String, Vec<&Expr>)> {
        match &self.kind {
            ExprKind::UnaryMessage {
                receiver, selector, ..
            } => Some((receiver, selector.clone(), Vec::new())),
            ExprKind::BinaryMessage {
                receiver,
                operator,
                argument,
                ..
            } => Some((receiver, operator.clone(), vec![argument.as_ref()])),
            ExprKind::KeywordMessage { receiver, pairs } => Some((
                receiver,
                keyword_selector(pairs),
                pairs.iter().map(|p| &p.argument).collect(),
            )),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, ExprKind::Return(_))
    }
}

/// One `keyword: argument` part of a keyword message.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordPair {
    pub keyword: String,
    pub keyword_span: Span,
    pub argument: Expr,
}

/// Concatenation of the keyword parts, e.g. `at:put:`.
pub fn keyword_selector(pairs: &[KeywordPair]) -> String {
    pairs.iter().map(|p| p.keyword.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),

    /// `self`
    SelfRef,
    /// `super`; only meaningful as a message receiver.
    SuperRef,
    /// A variable reference, resolved by the compiler.
    Ident(String),

    /// `receiver selector`
    UnaryMessage {
        receiver: Box<Expr>,
        selector: String,
        selector_span: Span,
    },

    /// `receiver op argument`
    BinaryMessage {
        receiver: Box<Expr>,
        operator: String,
        operator_span: Span,
        argument: Box<Expr>,
    },

    /// `receiver key1: arg1 key2: arg2`
    KeywordMessage {
        receiver: Box<Expr>,
        pairs: Vec<KeywordPair>,
    },

    /// `r m1; m2; m3`. Each message carries its own copy of the
    /// receiver expression.
    Cascade { messages: Vec<Expr> },

    /// `[:a :b | |t| body]`
    Block {
        params: Vec<String>,
        locals: Vec<String>,
        body: Vec<Expr>,
    },

    /// `^expr`
    Return(Box<Expr>),

    /// `name := value`
    Assignment {
        target: String,
        target_span: Span,
        value: Box<Expr>,
    },
}

/// `Name = Superclass ( |a b| methods )`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub name_span: Span,
    pub superclass: Option<(String, Span)>,
    pub instance_vars: Vec<String>,
    pub methods: Vec<MethodDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub selector: String,
    pub params: Vec<String>,
    pub body: MethodBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodBody {
    /// `<primitive: N>`
    Primitive { id: i64, span: Span },
    /// `( |locals| statements )`
    Code {
        locals: Vec<String>,
        statements: Vec<Expr>,
    },
}

// ── rendering ──────────────────────────────────────────────────────

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Symbol(s) => write!(f, "#{s}"),
            Literal::Array(items) => {
                f.write_str("#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Literal::Nil => f.write_str("nil"),
            Literal::True => f.write_str("true"),
            Literal::False => f.write_str("false"),
        }
    }
}

/// Fully parenthesized rendering, used in diagnostics and tests.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::SelfRef => f.write_str("self"),
            ExprKind::SuperRef => f.write_str("super"),
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::UnaryMessage {
                receiver, selector, ..
            } => write!(f, "({receiver} {selector})"),
            ExprKind::BinaryMessage {
                receiver,
                operator,
                argument,
                ..
            } => write!(f, "({receiver} {operator} {argument})"),
            ExprKind::KeywordMessage { receiver, pairs } => {
                write!(f, "({receiver}")?;
                for pair in pairs {
                    write!(f, " {} {}", pair.keyword, pair.argument)?;
                }
                f.write_str(")")
            }
            ExprKind::Cascade { messages } => {
                f.write_str("{")?;
                for (i, m) in messages.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{m}")?;
                }
                f.write_str("}")
            }
            ExprKind::Block {
                params,
                locals,
                body,
            } => {
                f.write_str("[")?;
                for p in params {
                    write!(f, ":{p} ")?;
                }
                if !params.is_empty() {
                    f.write_str("| ")?;
                }
                if !locals.is_empty() {
                    write!(f, "|{}| ", locals.join(" "))?;
                }
                for (i, stmt) in body.iter().enumerate() {
                    if i > 0 {
                        f.write_str(". ")?;
                    }
                    write!(f, "{stmt}")?;
                }
                f.write_str("]")
            }
            ExprKind::Return(value) => write!(f, "^{value}"),
            ExprKind::Assignment { target, value, .. } => write!(f, "{target} := {value}"),
        }
    }
}
