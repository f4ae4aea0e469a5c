//! Error recovery strategies for the parser.
//!
//! After a failed statement the parser skips ahead to a synchronization point
//! so that one pass can report several independent errors.

use ratus_lexer::TokenKind;

/// Tokens that start a new statement.
pub const STMT_STARTS: &[TokenKind] = &[
    TokenKind::Let,
    TokenKind::Var,
    TokenKind::Fn,
    TokenKind::Type,
    TokenKind::If,
    TokenKind::While,
    TokenKind::For,
    TokenKind::Return,
    TokenKind::Break,
    TokenKind::Continue,
];

/// Check if a token kind is in a set.
pub fn is_in_set(kind: &TokenKind, set: &[TokenKind]) -> bool {
    set.iter().any(|k| std::mem::discriminant(k) == std::mem::discriminant(kind))
}

pub fn is_stmt_start(kind: &TokenKind) -> bool {
    is_in_set(kind, STMT_STARTS)
}

/// How the parser reacts to a syntax error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Record the error, resynchronize at the next statement and keep going.
    #[default]
    Recover,
    /// Stop at the first error.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    Paren,   // )
    Bracket, // ]
    Brace,   // }
}

/// Tracks delimiters opened while skipping tokens, so that a `;` or `}` inside
/// a half-parsed nested construct is not mistaken for a statement boundary.
#[derive(Debug, Default)]
pub struct DelimiterStack {
    stack: Vec<DelimiterKind>,
}

impl DelimiterStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Update the stack for one skipped token.
    ///
    /// Returns false when the token closes a delimiter that was opened before
    /// skipping began; the caller must stop there.
    pub fn update(&mut self, token: &TokenKind) -> bool {
        let closing = match token {
            TokenKind::LParen => {
                self.stack.push(DelimiterKind::Paren);
                return true;
            }
            TokenKind::LBracket => {
                self.stack.push(DelimiterKind::Bracket);
                return true;
            }
            TokenKind::LBrace => {
                self.stack.push(DelimiterKind::Brace);
                return true;
            }
            TokenKind::RParen => DelimiterKind::Paren,
            TokenKind::RBracket => DelimiterKind::Bracket,
            TokenKind::RBrace => DelimiterKind::Brace,
            _ => return true,
        };
        match self.stack.last() {
            Some(&open) if open == closing => {
                self.stack.pop();
                true
            }
            // A mismatched closer inside skipped tokens is ignored.
            Some(_) => true,
            None => false,
        }
    }
}
