//! Line/column lookup for byte offsets.

use serde::Serialize;

use crate::BytePos;

/// A 1-based line and column. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Precomputed line starts for one source text.
#[derive(Debug, Clone)]
pub struct LineIndex<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    /// Locate `pos`. Offsets past the end clamp to the end of the text.
    pub fn location(&self, pos: BytePos) -> Location {
        let offset = usize::from(pos).min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |prefix| prefix.chars().count());
        Location {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_character_is_line_one_column_one() {
        let index = LineIndex::new("let x = 1;");
        assert_eq!(index.location(BytePos(0)), Location { line: 1, column: 1 });
        assert_eq!(index.location(BytePos(4)), Location { line: 1, column: 5 });
    }

    #[test]
    fn offsets_after_newlines() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.location(BytePos(2)), Location { line: 2, column: 1 });
        assert_eq!(index.location(BytePos(3)), Location { line: 2, column: 2 });
        assert_eq!(index.location(BytePos(5)), Location { line: 3, column: 1 });
        assert_eq!(index.location(BytePos(6)), Location { line: 4, column: 1 });
    }

    #[test]
    fn columns_count_characters() {
        let index = LineIndex::new("\"é\" + x");
        assert_eq!(index.location(BytePos(5)), Location { line: 1, column: 5 });
    }

    #[test]
    fn past_the_end_clamps() {
        let index = LineIndex::new("ab");
        assert_eq!(index.location(BytePos(99)), Location { line: 1, column: 3 });
    }
}
