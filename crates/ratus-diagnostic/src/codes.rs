//! Error codes for Ratus diagnostics.

use serde::Serialize;

/// Stable codes for every error the pipeline can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    // Lexer errors (E0001 - E0099)
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape,
    MalformedExponent,
    IntegerTooLarge,

    // Parser errors (E0100 - E0199)
    UnexpectedToken,
    ExpectedExpression,
    ExpectedType,
    ExpectedBlock,
    InvalidAssignTarget,
    NestingTooDeep,
    MissingSemicolon,

    // Type errors (E0200 - E0299)
    TypeMismatch,
    UnboundName,
    UnboundType,
    InfiniteType,
    NotCallable,
    WrongArity,
    MissingMember,
    ArgumentTypeMismatch,
    ReturnTypeMismatch,
    ImmutableAssignment,
    DuplicateBinding,
    MisplacedControlFlow,
    InferenceLimit,
    BinaryOpTypeMismatch,
    UnaryOpTypeMismatch,

    // Runtime faults (E0300 - E0399)
    DivisionByZero,
    IndexOutOfRange,
    MissingMemberAccess,
    StructuralMisuse,
    RuntimeTypeMismatch,
    ArithmeticOverflow,
    UnboundNameAtRuntime,
    StepLimitExceeded,
    CallDepthExceeded,
    AllocationLimitExceeded,
    HostFunctionFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            // Lexer
            ErrorCode::UnexpectedCharacter => "E0001",
            ErrorCode::UnterminatedString => "E0002",
            ErrorCode::InvalidEscape => "E0003",
            ErrorCode::MalformedExponent => "E0004",
            ErrorCode::IntegerTooLarge => "E0005",

            // Parser
            ErrorCode::UnexpectedToken => "E0100",
            ErrorCode::ExpectedExpression => "E0101",
            ErrorCode::ExpectedType => "E0102",
            ErrorCode::ExpectedBlock => "E0103",
            ErrorCode::InvalidAssignTarget => "E0104",
            ErrorCode::NestingTooDeep => "E0105",
            ErrorCode::MissingSemicolon => "E0106",

            // Type
            ErrorCode::TypeMismatch => "E0200",
            ErrorCode::UnboundName => "E0201",
            ErrorCode::UnboundType => "E0202",
            ErrorCode::InfiniteType => "E0203",
            ErrorCode::NotCallable => "E0204",
            ErrorCode::WrongArity => "E0205",
            ErrorCode::MissingMember => "E0206",
            ErrorCode::ArgumentTypeMismatch => "E0207",
            ErrorCode::ReturnTypeMismatch => "E0208",
            ErrorCode::ImmutableAssignment => "E0209",
            ErrorCode::DuplicateBinding => "E0210",
            ErrorCode::MisplacedControlFlow => "E0211",
            ErrorCode::InferenceLimit => "E0212",
            ErrorCode::BinaryOpTypeMismatch => "E0213",
            ErrorCode::UnaryOpTypeMismatch => "E0214",

            // Runtime
            ErrorCode::DivisionByZero => "E0300",
            ErrorCode::IndexOutOfRange => "E0301",
            ErrorCode::MissingMemberAccess => "E0302",
            ErrorCode::StructuralMisuse => "E0303",
            ErrorCode::RuntimeTypeMismatch => "E0304",
            ErrorCode::ArithmeticOverflow => "E0305",
            ErrorCode::UnboundNameAtRuntime => "E0306",
            ErrorCode::StepLimitExceeded => "E0307",
            ErrorCode::CallDepthExceeded => "E0308",
            ErrorCode::AllocationLimitExceeded => "E0309",
            ErrorCode::HostFunctionFailed => "E0310",
        }
    }

    /// A human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            // Lexer
            ErrorCode::UnexpectedCharacter => "unexpected character in input",
            ErrorCode::UnterminatedString => "string literal is not terminated",
            ErrorCode::InvalidEscape => "invalid escape sequence in string",
            ErrorCode::MalformedExponent => "exponent has no digits",
            ErrorCode::IntegerTooLarge => "integer literal does not fit in 64 bits",

            // Parser
            ErrorCode::UnexpectedToken => "unexpected token",
            ErrorCode::ExpectedExpression => "expected an expression",
            ErrorCode::ExpectedType => "expected a type",
            ErrorCode::ExpectedBlock => "expected a block",
            ErrorCode::InvalidAssignTarget => "invalid left-hand side of assignment",
            ErrorCode::NestingTooDeep => "expression is nested too deeply",
            ErrorCode::MissingSemicolon => "missing semicolon",

            // Type
            ErrorCode::TypeMismatch => "mismatched types",
            ErrorCode::UnboundName => "cannot find name in this scope",
            ErrorCode::UnboundType => "cannot find type in this scope",
            ErrorCode::InfiniteType => "recursive type has no finite value",
            ErrorCode::NotCallable => "expected a function, found a different type",
            ErrorCode::WrongArity => "wrong number of arguments",
            ErrorCode::MissingMember => "record has no such member",
            ErrorCode::ArgumentTypeMismatch => "argument type does not match parameter type",
            ErrorCode::ReturnTypeMismatch => "return type does not match function signature",
            ErrorCode::ImmutableAssignment => "cannot assign to an immutable binding",
            ErrorCode::DuplicateBinding => "name is already defined in this scope",
            ErrorCode::MisplacedControlFlow => "control flow statement outside its construct",
            ErrorCode::InferenceLimit => "type inference exceeded its instantiation limit",
            ErrorCode::BinaryOpTypeMismatch => "binary operator cannot be applied to these types",
            ErrorCode::UnaryOpTypeMismatch => "unary operator cannot be applied to this type",

            // Runtime
            ErrorCode::DivisionByZero => "division by zero",
            ErrorCode::IndexOutOfRange => "index out of range",
            ErrorCode::MissingMemberAccess => "record has no such member at runtime",
            ErrorCode::StructuralMisuse => "control flow or environment misuse",
            ErrorCode::RuntimeTypeMismatch => "operation applied to a value of the wrong shape",
            ErrorCode::ArithmeticOverflow => "integer arithmetic overflowed",
            ErrorCode::UnboundNameAtRuntime => "name is not bound at runtime",
            ErrorCode::StepLimitExceeded => "evaluation step budget exhausted",
            ErrorCode::CallDepthExceeded => "maximum call depth exceeded",
            ErrorCode::AllocationLimitExceeded => "list or string is longer than the configured limit",
            ErrorCode::HostFunctionFailed => "a host function reported an error",
        }
    }

    /// A suggested fix for the error, if there is an obvious one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorCode::UnterminatedString => Some("add the matching closing quote"),
            ErrorCode::MissingSemicolon => Some("add `;` at the end of the statement"),
            ErrorCode::UnboundName => Some("check the spelling or declare the name before use"),
            ErrorCode::WrongArity => {
                Some("check the function signature for the expected number of arguments")
            }
            ErrorCode::ImmutableAssignment => Some("declare the binding with `var` to allow assignment"),
            ErrorCode::InfiniteType => Some("make the recursive member optional, e.g. `next: T?`"),
            ErrorCode::MisplacedControlFlow => {
                Some("`break` and `continue` need a loop, `return` needs a function")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_stage() {
        assert!(ErrorCode::UnexpectedCharacter.as_str().starts_with("E00"));
        assert!(ErrorCode::ExpectedBlock.as_str().starts_with("E01"));
        assert!(ErrorCode::TypeMismatch.as_str().starts_with("E02"));
        assert!(ErrorCode::DivisionByZero.as_str().starts_with("E03"));
    }
}
