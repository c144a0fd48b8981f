//! Translation between LSP positions and byte offsets
//!
//! LSP positions are zero-based lines with columns counted in UTF-16 code units.
//! Both `\n` and `\r\n` terminate a line.

use tower_lsp::lsp_types::{Position, Range};

/// Byte offsets of every line start in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );

        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Converts a position to a byte offset.
    ///
    /// Returns `None` when the line does not exist, the column is past the end
    /// of the line, or the column splits a surrogate pair.
    pub fn offset(&self, text: &str, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.line_starts.get(line)?;
        let end = self.line_end(text, line);

        let mut remaining = position.character as usize;
        for (idx, ch) in text[start..end].char_indices() {
            if remaining == 0 {
                return Some(start + idx);
            }
            let width = ch.len_utf16();
            if remaining < width {
                return None;
            }
            remaining -= width;
        }

        (remaining == 0).then_some(end)
    }

    /// Converts a byte offset to a position. Offsets past the end are clamped.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let mut offset = offset.min(self.len);
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let character = text[start..offset].encode_utf16().count();

        Position::new(line as u32, character as u32)
    }

    /// Converts a byte span to a range
    pub fn range(&self, text: &str, start: usize, end: usize) -> Range {
        Range::new(self.position(text, start), self.position(text, end))
    }

    /// Converts a range to a byte span, `None` if either end is out of bounds
    /// or the range is inverted
    pub fn span(&self, text: &str, range: Range) -> Option<(usize, usize)> {
        let start = self.offset(text, range.start)?;
        let end = self.offset(text, range.end)?;
        (start <= end).then_some((start, end))
    }

    fn line_end(&self, text: &str, line: usize) -> usize {
        let start = self.line_starts[line];
        let mut end = self.line_starts.get(line + 1).copied().unwrap_or(self.len);

        if end > start && text.as_bytes()[end - 1] == b'\n' {
            end -= 1;
            if end > start && text.as_bytes()[end - 1] == b'\r' {
                end -= 1;
            }
        }

        end
    }
}
