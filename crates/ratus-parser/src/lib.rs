//! Parser for Ratus.
//!
//! This crate provides a recursive descent parser that converts tokens into
//! an abstract syntax tree, one function per precedence level.
//!
//! ## Error Recovery
//!
//! In [`ParseMode::Recover`] the parser records an error, skips to the next
//! statement boundary and continues, so several errors are reported in one
//! pass. [`ParseMode::Strict`] stops at the first error.

mod error;
mod parser;
mod recovery;

pub use error::ParseError;
pub use parser::Parser;
pub use recovery::ParseMode;

use ratus_diagnostic::Diagnostic;
use ratus_lexer::Token;
use ratus_syntax::{Module, TypeExpr};

/// Parse a token stream produced by the lexer into a module.
pub fn parse(tokens: Vec<Token>, mode: ParseMode) -> Result<Module, Vec<ParseError>> {
    let mut parser = Parser::new(tokens, mode);
    let module = parser.parse_module();
    let errors = parser.errors();
    if errors.is_empty() {
        Ok(module)
    } else {
        Err(errors)
    }
}

/// Parse a type written on its own, e.g. `fn(Int, Int) -> Int`.
pub fn parse_type(tokens: Vec<Token>) -> Result<TypeExpr, Vec<ParseError>> {
    let mut parser = Parser::new(tokens, ParseMode::Strict);
    let ty = parser.parse_type_only();
    let errors = parser.errors();
    match ty {
        Some(ty) if errors.is_empty() => Ok(ty),
        _ => Err(errors),
    }
}

/// Lex and parse source text, reporting problems of either stage as diagnostics.
pub fn parse_source(source: &str) -> Result<Module, Vec<Diagnostic>> {
    let tokens = ratus_lexer::tokenize(source)
        .map_err(|errors| errors.iter().map(Diagnostic::from).collect::<Vec<_>>())?;
    parse(tokens, ParseMode::Recover)
        .map_err(|errors| errors.iter().map(Diagnostic::from).collect())
}
