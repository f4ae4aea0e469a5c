//! Lexical errors.

use ratus_common::Span;
use ratus_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, Label};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscape(char),
    #[error("malformed exponent in number literal")]
    MalformedExponent,
    #[error("integer literal `{0}` is too large")]
    IntegerTooLarge(String),
}

impl LexErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            LexErrorKind::UnexpectedCharacter(_) => ErrorCode::UnexpectedCharacter,
            LexErrorKind::UnterminatedString => ErrorCode::UnterminatedString,
            LexErrorKind::InvalidEscape(_) => ErrorCode::InvalidEscape,
            LexErrorKind::MalformedExponent => ErrorCode::MalformedExponent,
            LexErrorKind::IntegerTooLarge(_) => ErrorCode::IntegerTooLarge,
        }
    }
}

/// A malformed token at an exact position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {line}:{column}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl From<&LexError> for Diagnostic {
    fn from(err: &LexError) -> Self {
        let label = match &err.kind {
            LexErrorKind::UnexpectedCharacter(_) => "unexpected character",
            LexErrorKind::UnterminatedString => "string starts here",
            LexErrorKind::InvalidEscape(_) => "invalid escape",
            LexErrorKind::MalformedExponent => "expected digits after the exponent",
            LexErrorKind::IntegerTooLarge(_) => "exceeds the 64-bit integer range",
        };
        Diagnostic::error(DiagnosticKind::Lexer, err.span, err.kind.to_string())
            .with_code(err.kind.code())
            .with_label(Label::new(err.span, label))
    }
}
