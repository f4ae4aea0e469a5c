//! Type expressions as written in source.

use ratus_common::Span;

use crate::Ident;

/// A type annotation.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `Int`, `Str`, or a `type` alias name
    Named(Ident),
    /// `{name: Str, age: Int}`
    Record(Vec<RecordTypeField>),
    /// `[T]`
    List(Box<TypeExpr>),
    /// `fn(A, B) -> R`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    /// `T?`
    Optional(Box<TypeExpr>),
}

#[derive(Debug, Clone)]
pub struct RecordTypeField {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}
