//! Integration tests for ratus-common crate.

use pretty_assertions::assert_eq;
use ratus_common::{BytePos, LineIndex, Location, Span};

#[test]
fn test_span_merge() {
    let a = Span::from_usize(10, 20);
    let b = Span::from_usize(15, 30);
    let merged = a.merge(b);
    assert_eq!(merged.start.0, 10);
    assert_eq!(merged.end.0, 30);
    assert_eq!(b.merge(a), merged);
}

#[test]
fn test_span_len_and_contains() {
    let span = Span::from_usize(5, 15);
    assert_eq!(span.len(), 10);
    assert!(span.contains(BytePos(5)));
    assert!(!span.contains(BytePos(15)));
    assert!(Span::point(BytePos(3)).is_empty());
}

#[test]
fn test_span_range() {
    let span = Span::from_usize(5, 15);
    assert_eq!(span.range(), 5..15);
}

#[test]
fn test_byte_pos_offset() {
    let pos = BytePos(10);
    assert_eq!(pos.offset(5), BytePos(15));
}

// ============================================================================
// Line Index
// ============================================================================

#[test]
fn test_line_index_multibyte_columns() {
    let source = "let s = \"ü\";\nlet t = s;";
    let index = LineIndex::new(source);
    let semicolon = source.find(';').expect("has a semicolon");
    assert_eq!(
        index.location(BytePos(semicolon as u32)),
        Location { line: 1, column: 12 }
    );
    let t = source.find("let t").expect("has a second binding") + 4;
    assert_eq!(index.location(BytePos(t as u32)), Location { line: 2, column: 5 });
}

#[test]
fn test_line_index_clamps_past_end() {
    let index = LineIndex::new("ab\nc");
    assert_eq!(index.line_count(), 2);
    assert_eq!(index.location(BytePos(100)), Location { line: 2, column: 2 });
}
