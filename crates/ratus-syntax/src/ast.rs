//! Module, statement and declaration nodes.

use std::fmt;

use ratus_common::Span;

use crate::{Expr, TypeExpr};

/// Identity of an expression or function node, unique within one module.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A whole source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub stmts: Vec<Stmt>,
    /// Final expression without a trailing `;`; its value is the program result.
    pub entry: Option<Expr>,
    pub span: Span,
}

/// An identifier with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A brace-delimited sequence of statements.
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// A statement.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `let x = e;` or `var x: T = e;`
    Let {
        mutable: bool,
        name: Ident,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    /// `fn name(params) -> T { ... }`
    Fn(FnDecl),
    /// `type Name = T;`
    TypeDecl { name: Ident, ty: TypeExpr },
    /// `if c { } else if d { } else { }`
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    /// `while c { }`
    While { condition: Expr, body: Block },
    /// `for x in e { }`
    For {
        binding: Ident,
        iterable: Expr,
        body: Block,
    },
    /// `return e;`
    Return(Option<Expr>),
    Break,
    Continue,
    /// A nested `{ ... }` block.
    Block(Block),
    /// `place = e;` where the place is a name, attribute or index expression.
    Assign { target: Expr, value: Expr },
    /// `e;`
    Expr(Expr),
}

/// A function definition, named (statement) or anonymous (lambda).
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

impl FnDecl {
    /// Name used in diagnostics and value rendering.
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("<lambda>", |n| n.name.as_str())
    }

    /// A function whose parameters are all annotated.
    pub fn is_fully_annotated(&self) -> bool {
        self.params.iter().all(|p| p.ty.is_some())
    }
}

/// A function parameter; the annotation is optional.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}
