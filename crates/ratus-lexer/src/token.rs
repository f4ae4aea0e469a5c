//! Token definitions for Ratus.

use std::fmt;

use ratus_common::Span;

/// A token with its kind, exact source text and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
    /// 1-based line of the first character.
    pub line: u32,
    /// 1-based column of the first character, counted in characters.
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span, line: u32, column: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
            line,
            column,
        }
    }
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    /// String literal with escapes already resolved.
    Str(String),

    // Identifiers
    Ident(String),

    // Keywords
    Let,
    Var,
    Fn,
    Type,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    True,
    False,
    None,
    And,
    Or,
    Not,

    // Delimiters
    LParen,     // (
    RParen,     // )
    LBrace,     // {
    RBrace,     // }
    LBracket,   // [
    RBracket,   // ]

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    Eq,         // =
    EqEq,       // ==
    BangEq,     // !=
    Bang,       // !
    Lt,         // <
    LtEq,       // <=
    Gt,         // >
    GtEq,       // >=
    Arrow,      // ->
    Question,   // ?

    // Punctuation
    Comma,      // ,
    Colon,      // :
    Semicolon,  // ;
    Dot,        // .

    // Special
    Eof,
    Error,
}

impl TokenKind {
    /// Returns true if this token is a keyword.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Var
                | TokenKind::Fn
                | TokenKind::Type
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
        )
    }

    /// Returns the keyword for an identifier, if any.
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "let" => Some(TokenKind::Let),
            "var" => Some(TokenKind::Var),
            "fn" => Some(TokenKind::Fn),
            "type" => Some(TokenKind::Type),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "return" => Some(TokenKind::Return),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "none" => Some(TokenKind::None),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "not" => Some(TokenKind::Not),
            _ => None,
        }
    }

    /// The fixed spelling of punctuation and keyword tokens.
    pub fn symbol(&self) -> Option<&'static str> {
        let s = match self {
            TokenKind::Let => "let",
            TokenKind::Var => "var",
            TokenKind::Fn => "fn",
            TokenKind::Type => "type",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::None => "none",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Bang => "!",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Arrow => "->",
            TokenKind::Question => "?",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            _ => return None,
        };
        Some(s)
    }
}

/// Renders the token the way diagnostics mention it: "`{`", "identifier `x`".
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "integer `{n}`"),
            TokenKind::Float(x) => write!(f, "float `{x:?}`"),
            TokenKind::Str(s) => write!(f, "string {s:?}"),
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Error => write!(f, "invalid token"),
            other => match other.symbol() {
                Some(s) => write!(f, "`{s}`"),
                None => write!(f, "{other:?}"),
            },
        }
    }
}
