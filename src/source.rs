use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in a source file. Both fields are 1-based; `column` counts
/// UTF-16 code units, the unit JavaScript engines report in stack traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open source range: `start` is inside, `end` is the first position after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }
}

/// Maps byte offsets of a source text onto [`Position`]s.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(offset, _)| offset + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    pub fn position_at(&self, byte_offset: usize) -> Position {
        let offset = byte_offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = self
            .source
            .get(line_start..offset)
            .map(|prefix| prefix.encode_utf16().count())
            .unwrap_or(offset - line_start);

        Position {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }

    pub fn range(&self, start_byte: usize, end_byte: usize) -> SourceRange {
        SourceRange {
            start: self.position_at(start_byte),
            end: self.position_at(end_byte),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_one_based() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.position_at(0), Position::new(1, 1));
        assert_eq!(index.position_at(1), Position::new(1, 2));
        assert_eq!(index.position_at(3), Position::new(2, 1));
        assert_eq!(index.position_at(6), Position::new(3, 1));
    }

    #[test]
    fn columns_count_utf16_units() {
        let source = "const s = 'é'; x";
        let index = LineIndex::new(source);
        let offset = source.find('x').unwrap();
        assert_eq!(index.position_at(offset), Position::new(1, 16));

        // outside the BMP: one character, two code units
        let source = "const s = '😀'; x";
        let index = LineIndex::new(source);
        let offset = source.find('x').unwrap();
        assert_eq!(index.position_at(offset), Position::new(1, 17));
    }

    #[test]
    fn range_end_is_exclusive() {
        let range = SourceRange::new(Position::new(1, 5), Position::new(3, 2));
        assert!(range.contains(Position::new(1, 5)));
        assert!(range.contains(Position::new(2, 1)));
        assert!(range.contains(Position::new(3, 1)));
        assert!(!range.contains(Position::new(3, 2)));
        assert!(!range.contains(Position::new(1, 4)));
    }
}
