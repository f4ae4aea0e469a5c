//! Expression nodes.

use std::fmt;

use ratus_common::Span;

use crate::{FnDecl, Ident, NodeId};

/// An expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind, span: Span) -> Self {
        Self { id, kind, span }
    }

    /// Whether this expression may appear on the left of `=`.
    pub fn is_place(&self) -> bool {
        match &self.kind {
            ExprKind::Ident(_) => true,
            ExprKind::Attribute { base, .. } | ExprKind::Index { base, .. } => base.is_place(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// `none`
    None,

    /// Name reference
    Ident(Ident),

    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `{x: 1, y: 2}`
    Record(Vec<RecordField>),

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `f(x, y)`
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `x.name`
    Attribute { base: Box<Expr>, name: Ident },
    /// `xs[i]`
    Index { base: Box<Expr>, index: Box<Expr> },

    /// `fn(x) { return x; }`
    Lambda(Box<FnDecl>),
}

/// A field in a record literal.
#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Logical
    And, // and
    Or,  // or
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg, // -
    Not, // not / !
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("not"),
        }
    }
}
