//! Integration tests for ratus-lexer crate.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ratus_lexer::{LexErrorKind, TokenKind, tokenize};

fn lex(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .unwrap_or_else(|errors| panic!("unexpected lex errors: {errors:?}"))
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn lex_errors(source: &str) -> Vec<LexErrorKind> {
    match tokenize(source) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.into_iter().map(|e| e.kind).collect(),
    }
}

// ============================================================================
// Basic Token Tests
// ============================================================================

#[test]
fn test_keywords() {
    assert_eq!(
        lex("let var fn type if else while for in return break continue"),
        vec![
            TokenKind::Let,
            TokenKind::Var,
            TokenKind::Fn,
            TokenKind::Type,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::For,
            TokenKind::In,
            TokenKind::Return,
            TokenKind::Break,
            TokenKind::Continue,
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        lex("true false none and or not"),
        vec![
            TokenKind::True,
            TokenKind::False,
            TokenKind::None,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_identifiers_are_not_keywords() {
    assert_eq!(
        lex("letter _tmp x1 None"),
        vec![
            TokenKind::Ident("letter".into()),
            TokenKind::Ident("_tmp".into()),
            TokenKind::Ident("x1".into()),
            TokenKind::Ident("None".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        lex("42 1_000 3.25 1e3 2.5E-1"),
        vec![
            TokenKind::Int(42),
            TokenKind::Int(1000),
            TokenKind::Float(3.25),
            TokenKind::Float(1000.0),
            TokenKind::Float(0.25),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_strings_resolve_escapes() {
    assert_eq!(
        lex(r#""a\tb" 'it\'s' "q\"""#),
        vec![
            TokenKind::Str("a\tb".into()),
            TokenKind::Str("it's".into()),
            TokenKind::Str("q\"".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_comments_and_newlines_are_dropped() {
    assert_eq!(
        lex("x # a comment\n\n  + # another\n y"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Plus,
            TokenKind::Ident("y".into()),
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn test_token_positions() {
    let tokens = tokenize("let a = 1;\n  a + 2").expect("lexes");
    let plus = tokens.iter().find(|t| t.kind == TokenKind::Plus).expect("has a plus");
    assert_eq!((plus.line, plus.column), (2, 5));
    assert_eq!(plus.span.range(), 15..16);
    assert_eq!(plus.lexeme, "+");
}

#[test]
fn test_columns_count_characters() {
    let tokens = tokenize("\"é\" + x").expect("lexes");
    let x = tokens.iter().find(|t| t.kind == TokenKind::Ident("x".into())).expect("has x");
    assert_eq!(x.column, 7);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_all_errors_reported_in_one_scan() {
    assert_eq!(
        lex_errors("let a = 1 @ 2; let b = \"x\\q\" $"),
        vec![
            LexErrorKind::UnexpectedCharacter('@'),
            LexErrorKind::InvalidEscape('q'),
            LexErrorKind::UnexpectedCharacter('$'),
        ]
    );
}

#[test]
fn test_unterminated_string_and_literal_limits() {
    assert_eq!(lex_errors("\"open"), vec![LexErrorKind::UnterminatedString]);
    assert_eq!(lex_errors("1e+"), vec![LexErrorKind::MalformedExponent]);
    assert_eq!(
        lex_errors("9223372036854775808"),
        vec![LexErrorKind::IntegerTooLarge("9223372036854775808".into())]
    );
}

#[test]
fn test_error_location() {
    let errors = tokenize("ok\n  ~").expect_err("rejects `~`");
    assert_eq!(errors.len(), 1);
    assert_eq!((errors[0].line, errors[0].column), (2, 3));
}

// ============================================================================
// Round-trip Properties
// ============================================================================

fn lexeme() -> impl Strategy<Value = (String, TokenKind)> {
    let ident = "[a-z][a-z0-9_]{0,6}"
        .prop_filter("not a keyword", |s| TokenKind::keyword_from_str(s).is_none())
        .prop_map(|s| (s.clone(), TokenKind::Ident(s)));
    let int = (0i64..1_000_000).prop_map(|n| (n.to_string(), TokenKind::Int(n)));
    let float = (0u32..1000, 0u32..100).prop_map(|(a, b)| {
        let text = format!("{a}.{b}");
        let value = text.parse().unwrap_or(0.0);
        (text, TokenKind::Float(value))
    });
    let string = "[a-z ]{0,5}".prop_map(|s| (format!("\"{s}\""), TokenKind::Str(s)));
    let symbol = prop::sample::select(vec![
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::BangEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
        ("->", TokenKind::Arrow),
        ("=", TokenKind::Eq),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("{", TokenKind::LBrace),
        ("}", TokenKind::RBrace),
        ("[", TokenKind::LBracket),
        ("]", TokenKind::RBracket),
        (",", TokenKind::Comma),
        (";", TokenKind::Semicolon),
        ("?", TokenKind::Question),
        ("let", TokenKind::Let),
        ("while", TokenKind::While),
    ])
    .prop_map(|(s, kind)| (s.to_string(), kind));
    prop_oneof![ident, int, float, string, symbol]
}

proptest! {
    #[test]
    fn test_lexemes_round_trip(items in prop::collection::vec(lexeme(), 0..24)) {
        let source = items.iter().map(|(text, _)| text.as_str()).collect::<Vec<_>>().join(" ");
        let tokens = tokenize(&source).expect("generated source lexes");

        let (last, body) = tokens.split_last().expect("always ends in Eof");
        prop_assert_eq!(&last.kind, &TokenKind::Eof);
        prop_assert_eq!(body.len(), items.len());
        for (token, (text, kind)) in body.iter().zip(&items) {
            prop_assert_eq!(&token.kind, kind);
            prop_assert_eq!(&token.lexeme, text);
            prop_assert_eq!(&source[token.span.range()], text.as_str());
        }
    }

    #[test]
    fn test_lexer_never_panics(source in "\\PC{0,64}") {
        let _ = tokenize(&source);
    }
}
