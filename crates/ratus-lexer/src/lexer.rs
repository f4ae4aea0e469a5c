//! The Ratus lexer.

use std::iter::Peekable;
use std::str::CharIndices;

use ratus_common::Span;

use crate::error::{LexError, LexErrorKind};
use crate::token::{Token, TokenKind};

/// The Ratus lexer.
///
/// Converts source text into a sequence of tokens. Malformed input produces an
/// [`TokenKind::Error`] token plus a [`LexError`], and scanning continues, so a
/// single pass reports every lexical problem in the file.
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    /// Byte offset of the next unread character.
    pos: usize,
    line: u32,
    column: u32,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source and return tokens and errors.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tracing::debug!(tokens = tokens.len(), errors = self.errors.len(), "lexed source");
        (tokens, self.errors)
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;
        let (line, column) = (self.line, self.column);

        let Some((_, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, "", Span::from_usize(start, start), line, column);
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,

            '-' => self.either('>', TokenKind::Arrow, TokenKind::Minus),
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.either('=', TokenKind::BangEq, TokenKind::Bang),
            '<' => self.either('=', TokenKind::LtEq, TokenKind::Lt),
            '>' => self.either('=', TokenKind::GtEq, TokenKind::Gt),

            '"' | '\'' => self.string_literal(ch, start, line, column),

            '0'..='9' => self.number(start, line, column),

            'a'..='z' | 'A'..='Z' | '_' => self.identifier(start),

            _ => {
                self.error(LexErrorKind::UnexpectedCharacter(ch), start, line, column);
                TokenKind::Error
            }
        };

        Token::new(
            kind,
            &self.source[start..self.pos],
            Span::from_usize(start, self.pos),
            line,
            column,
        )
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, ch)| ch)
    }

    /// Maximal munch for two-character operators.
    fn either(&mut self, next: char, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.peek_char() == Some(next) {
            self.advance();
            long
        } else {
            short
        }
    }

    /// Skip whitespace and `#` line comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(ch) = self.peek_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn error(&mut self, kind: LexErrorKind, start: usize, line: u32, column: u32) {
        self.errors.push(LexError {
            kind,
            span: Span::from_usize(start, self.pos),
            line,
            column,
        });
    }

    /// Scan a string literal delimited by `quote`; the opening quote is consumed.
    fn string_literal(&mut self, quote: char, start: usize, line: u32, column: u32) -> TokenKind {
        let mut value = String::new();
        let mut valid = true;

        loop {
            let (esc_start, esc_line, esc_column) = (self.pos, self.line, self.column);
            match self.advance() {
                None => {
                    self.error(LexErrorKind::UnterminatedString, start, line, column);
                    return TokenKind::Error;
                }
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.advance() {
                    None => {
                        self.error(LexErrorKind::UnterminatedString, start, line, column);
                        return TokenKind::Error;
                    }
                    Some((_, c)) => match escape_char(c) {
                        Some(resolved) => value.push(resolved),
                        None => {
                            self.error(LexErrorKind::InvalidEscape(c), esc_start, esc_line, esc_column);
                            valid = false;
                        }
                    },
                },
                Some((_, c)) => value.push(c),
            }
        }

        if valid { TokenKind::Str(value) } else { TokenKind::Error }
    }

    /// Scan an integer or float literal; the first digit is consumed.
    fn number(&mut self, start: usize, line: u32, column: u32) -> TokenKind {
        self.digits();

        let mut is_float = false;

        // `1.x` is an attribute access on an integer, not a float.
        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.digits();
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            if !self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.error(LexErrorKind::MalformedExponent, start, line, column);
                return TokenKind::Error;
            }
            self.digits();
        }

        let text: String = self.source[start..self.pos].chars().filter(|&c| c != '_').collect();

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => TokenKind::Float(value),
                Err(_) => {
                    self.error(LexErrorKind::MalformedExponent, start, line, column);
                    TokenKind::Error
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                Err(_) => {
                    self.error(LexErrorKind::IntegerTooLarge(text), start, line, column);
                    TokenKind::Error
                }
            }
        }
    }

    /// Digits with `_` separators.
    fn digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.pos];
        TokenKind::keyword_from_str(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }
}

fn escape_char(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}
