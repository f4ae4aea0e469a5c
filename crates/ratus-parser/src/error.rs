//! Syntax errors.

use ratus_common::Span;
use ratus_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, Label};
use thiserror::Error;

/// A syntax error: what the parser wanted and what it saw instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub span: Span,
    pub expected: String,
    pub found: String,
    pub code: ErrorCode,
}

impl ParseError {
    pub fn new(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            span,
            expected: expected.into(),
            found: found.into(),
            code: ErrorCode::UnexpectedToken,
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        Diagnostic::error(DiagnosticKind::Parser, err.span, err.to_string())
            .with_code(err.code)
            .with_label(Label::new(err.span, format!("expected {}", err.expected)))
    }
}
