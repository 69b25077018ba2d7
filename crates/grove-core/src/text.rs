//! Positions, ranges and the byte/UTF-16 conversions between them.

use serde::{Deserialize, Serialize};

pub use text_size::{TextRange, TextSize};

/// Zero-based line plus UTF-16 column, as editors report cursor locations.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at `at`; used for insertions and file-level diagnostics.
    pub const fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// Inclusive at both ends: a caret right after an identifier still selects it.
    pub fn contains(&self, at: Position) -> bool {
        (self.start..=self.end).contains(&at)
    }
}

/// Byte span of one line, excluding its terminator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Line {
    start: TextSize,
    end: TextSize,
}

/// Line table of one text snapshot. `\n`, `\r\n` and a lone `\r` all end a line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineIndex {
    lines: Vec<Line>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0usize;
        let mut chars = text.char_indices().peekable();
        while let Some((at, ch)) = chars.next() {
            let next_start = match ch {
                '\n' => at + 1,
                '\r' if matches!(chars.peek(), Some((_, '\n'))) => {
                    chars.next();
                    at + 2
                }
                '\r' => at + 1,
                _ => continue,
            };
            lines.push(Line {
                start: size(start),
                end: size(at),
            });
            start = next_start;
        }
        lines.push(Line {
            start: size(start),
            end: size(text.len()),
        });
        Self {
            lines,
            len: size(text.len()),
        }
    }

    pub fn text_len(&self) -> TextSize {
        self.len
    }

    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Editor position of byte `offset`. Offsets past the end clamp to it; offsets inside a
    /// line terminator clamp to the end of that line.
    ///
    /// `text` must be the snapshot this index was built from.
    pub fn position(&self, text: &str, offset: TextSize) -> Position {
        debug_assert_eq!(size(text.len()), self.len);
        let offset = offset.min(self.len);
        let line_no = self
            .lines
            .partition_point(|line| line.start <= offset)
            .saturating_sub(1);
        let line = self.lines[line_no];
        let prefix = &text[usize::from(line.start)..usize::from(offset.min(line.end))];
        Position::new(line_no as u32, utf16_len(prefix))
    }

    /// Byte offset of `position`, or `None` when the line does not exist, the column runs past
    /// the line's end, or the column splits a surrogate pair.
    pub fn offset_of_position(&self, text: &str, position: Position) -> Option<TextSize> {
        debug_assert_eq!(size(text.len()), self.len);
        let line = *self.lines.get(position.line as usize)?;
        let content = &text[usize::from(line.start)..usize::from(line.end)];

        let mut column = 0u32;
        for (at, ch) in content.char_indices() {
            if column >= position.character {
                break;
            }
            column += ch.len_utf16() as u32;
            if column > position.character {
                return None;
            }
            if column == position.character {
                return Some(line.start + size(at + ch.len_utf8()));
            }
        }
        (column == position.character).then_some(line.start)
    }

    pub fn range(&self, text: &str, range: TextRange) -> Range {
        Range::new(
            self.position(text, range.start()),
            self.position(text, range.end()),
        )
    }

    /// Byte range of an editor range; `None` if either end is invalid or they are reversed.
    pub fn text_range(&self, text: &str, range: Range) -> Option<TextRange> {
        let start = self.offset_of_position(text, range.start)?;
        let end = self.offset_of_position(text, range.end)?;
        (start <= end).then(|| TextRange::new(start, end))
    }
}

fn size(len: usize) -> TextSize {
    TextSize::from(len as u32)
}

fn utf16_len(text: &str) -> u32 {
    text.chars().map(|ch| ch.len_utf16() as u32).sum()
}
