//! Type errors and their diagnostics.
//!
//! The builders here take already formatted shape strings so they stay
//! independent of the arena.

use ratus_common::Span;
use ratus_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, Label};
use ratus_syntax::{BinOp, UnaryOp};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeErrorKind {
    UnboundName,
    TypeMismatch,
    MissingMember,
    Arity,
    ArgumentType,
    ReturnType,
    ImmutableAssignment,
    DuplicateBinding,
    UnboundType,
    InfiniteType,
    MisplacedControlFlow,
    InferenceLimit,
}

impl TypeErrorKind {
    /// Stable name used in structured reports.
    pub fn name(self) -> &'static str {
        match self {
            TypeErrorKind::UnboundName => "UnboundNameError",
            TypeErrorKind::TypeMismatch => "TypeMismatchError",
            TypeErrorKind::MissingMember => "MissingMemberError",
            TypeErrorKind::Arity => "ArityError",
            TypeErrorKind::ArgumentType => "ArgumentTypeError",
            TypeErrorKind::ReturnType => "ReturnTypeError",
            TypeErrorKind::ImmutableAssignment => "ImmutableAssignmentError",
            TypeErrorKind::DuplicateBinding => "DuplicateBindingError",
            TypeErrorKind::UnboundType => "UnboundTypeError",
            TypeErrorKind::InfiniteType => "InfiniteTypeError",
            TypeErrorKind::MisplacedControlFlow => "MisplacedControlFlowError",
            TypeErrorKind::InferenceLimit => "InferenceLimitError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub code: ErrorCode,
    pub span: Span,
    pub message: String,
    pub label: String,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, code: ErrorCode, span: Span, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            code,
            span,
            label: message.clone(),
            message,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl From<&TypeError> for Diagnostic {
    fn from(err: &TypeError) -> Self {
        let mut diag = Diagnostic::error(DiagnosticKind::Type, err.span, &err.message)
            .with_code(err.code)
            .with_label(Label::new(err.span, &err.label));
        for note in &err.notes {
            diag = diag.with_note(note);
        }
        if let Some(help) = &err.help {
            diag = diag.with_help(help);
        }
        diag
    }
}

/// Builder for type mismatch errors.
pub struct TypeMismatchError {
    expected: String,
    found: String,
    span: Span,
    context: Option<String>,
}

impl TypeMismatchError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
            span,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn build(self) -> TypeError {
        let message = match &self.context {
            Some(ctx) => format!("mismatched types in {ctx}"),
            None => "mismatched types".to_string(),
        };
        TypeError::new(TypeErrorKind::TypeMismatch, ErrorCode::TypeMismatch, self.span, message)
            .with_label(format!("expected `{}`, found `{}`", self.expected, self.found))
    }
}

pub fn binary_op_mismatch(op: BinOp, left: &str, right: &str, span: Span) -> TypeError {
    let help = match op {
        BinOp::Add if left == "Str" || right == "Str" => {
            Some("convert the other operand with `str(...)` to concatenate")
        }
        BinOp::And | BinOp::Or => Some("both operands of a logical operator must be `Bool`"),
        _ => None,
    };
    let err = TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::BinaryOpTypeMismatch,
        span,
        format!("cannot apply `{op}` to `{left}` and `{right}`"),
    )
    .with_label(format!("`{left}` {op} `{right}`"));
    match help {
        Some(help) => err.with_help(help),
        None => err,
    }
}

pub fn unary_op_mismatch(op: UnaryOp, operand: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::UnaryOpTypeMismatch,
        span,
        format!("cannot apply `{op}` to `{operand}`"),
    )
    .with_label(format!("this has shape `{operand}`"))
}

pub fn unbound_name(name: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::UnboundName,
        ErrorCode::UnboundName,
        span,
        format!("cannot find `{name}` in this scope"),
    )
    .with_label("not found in this scope")
}

pub fn unbound_type(name: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::UnboundType,
        ErrorCode::UnboundType,
        span,
        format!("cannot find type `{name}` in this scope"),
    )
    .with_label("unknown type")
    .with_help("builtin types are `Int`, `Float`, `Str`, `Bool` and `None`")
}

pub fn missing_member(name: &str, shape: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::MissingMember,
        ErrorCode::MissingMember,
        span,
        format!("no member `{name}` on `{shape}`"),
    )
    .with_label(format!("`{shape}` has no member `{name}`"))
}

pub fn wrong_arity(name: &str, expected: usize, found: usize, span: Span) -> TypeError {
    let plural = if expected == 1 { "" } else { "s" };
    TypeError::new(
        TypeErrorKind::Arity,
        ErrorCode::WrongArity,
        span,
        format!("`{name}` takes {expected} argument{plural} but {found} were supplied"),
    )
    .with_label(format!("expected {expected} argument{plural}"))
}

pub fn argument_mismatch(index: usize, expected: &str, found: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::ArgumentType,
        ErrorCode::ArgumentTypeMismatch,
        span,
        format!("argument {} has the wrong shape", index + 1),
    )
    .with_label(format!("expected `{expected}`, found `{found}`"))
}

pub fn return_mismatch(expected: &str, found: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::ReturnType,
        ErrorCode::ReturnTypeMismatch,
        span,
        "returned value does not match the declared return type",
    )
    .with_label(format!("expected `{expected}`, found `{found}`"))
}

pub fn immutable_assignment(name: &str, span: Span, declared_at: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::ImmutableAssignment,
        ErrorCode::ImmutableAssignment,
        span,
        format!("cannot assign to immutable binding `{name}`"),
    )
    .with_label("assignment to an immutable binding")
    .with_note(format!("`{name}` is declared at {}..{}", declared_at.start.0, declared_at.end.0))
}

pub fn duplicate_binding(name: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::DuplicateBinding,
        ErrorCode::DuplicateBinding,
        span,
        format!("`{name}` is already defined in this scope"),
    )
    .with_label("redefined here")
}

pub fn incompatible_returns(first: &str, found: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::ReturnType,
        ErrorCode::ReturnTypeMismatch,
        span,
        "returned values have incompatible shapes",
    )
    .with_label(format!("earlier returns give `{first}`, this gives `{found}`"))
    .with_help("add a return type annotation to state the intended shape")
}

pub fn missing_return(expected: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::ReturnType,
        ErrorCode::ReturnTypeMismatch,
        span,
        format!("function may finish without returning `{expected}`"),
    )
    .with_label("control can reach the end of this body")
}

pub fn misplaced(what: &str, needs: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::MisplacedControlFlow,
        ErrorCode::MisplacedControlFlow,
        span,
        format!("`{what}` outside of {needs}"),
    )
}

pub fn infinite_type(name: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::InfiniteType,
        ErrorCode::InfiniteType,
        span,
        format!("type `{name}` has no finite value"),
    )
    .with_label("every value of this type would contain another one")
}

pub fn inference_limit(name: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::InferenceLimit,
        ErrorCode::InferenceLimit,
        span,
        format!("could not infer a shape for `{name}`"),
    )
    .with_label("instantiated too often or with a shape that keeps growing")
    .with_help("annotate the parameters and return type of this function")
}

pub fn not_callable(shape: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::NotCallable,
        span,
        format!("`{shape}` is not callable"),
    )
    .with_label("called here")
}

pub fn optional_access(name: &str, shape: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::TypeMismatch,
        span,
        format!("cannot access `.{name}` on optional `{shape}`"),
    )
    .with_label("this value may be `none`")
    .with_help("compare with `none` first, e.g. `if x != none { ... }`")
}

pub fn not_indexable(shape: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::TypeMismatch,
        span,
        format!("cannot index into `{shape}`"),
    )
    .with_label("expected a list or `Str`")
}

pub fn not_iterable(shape: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::TypeMismatch,
        span,
        format!("cannot iterate over `{shape}`"),
    )
    .with_label("expected a list or `Str`")
}

pub fn string_assignment(span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::TypeMismatch,
        ErrorCode::TypeMismatch,
        span,
        "strings cannot be modified in place",
    )
    .with_label("assignment into a `Str`")
    .with_help("build a new string with `+` instead")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_diagnostic_carries_code_and_label() {
        let err = TypeMismatchError::new("Bool", "Int", Span::from_usize(3, 4))
            .with_context("`if` condition")
            .build();
        assert_eq!(err.kind, TypeErrorKind::TypeMismatch);
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.code, Some(ErrorCode::TypeMismatch));
        assert_eq!(diag.message, "mismatched types in `if` condition");
        assert_eq!(diag.labels[0].message, "expected `Bool`, found `Int`");
    }

    #[test]
    fn string_concatenation_gets_a_hint() {
        let err = binary_op_mismatch(BinOp::Add, "Int", "Str", Span::DUMMY);
        assert!(err.help.as_deref().is_some_and(|h| h.contains("str(")));
    }
}
