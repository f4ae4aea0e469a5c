//! Lexical analysis for Ratus.
//!
//! This crate provides the lexer that converts source text into tokens. The
//! grammar is newline-insensitive, so whitespace and `#` comments are dropped
//! here and never reach the parser.

mod error;
mod lexer;
mod token;

pub use error::{LexError, LexErrorKind};
pub use lexer::Lexer;
pub use token::{Token, TokenKind};

/// Tokenize `source`, failing with every lexical error found in one scan.
///
/// On success the last token is always [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let (tokens, errors) = Lexer::new(source).tokenize();
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}
