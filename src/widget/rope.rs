//! Text rope: chunked line storage for buffer models.
//!
//! Lines are grouped into fixed-size chunks so that large streamed documents
//! do not turn into one allocation per line, and line lookup stays O(1).

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Number of lines per chunk.
const CHUNK_SIZE: usize = 64;

/// A chunk of lines stored contiguously.
#[derive(Debug, Clone)]
struct Chunk {
    lines: Vec<String>,
}

impl Chunk {
    fn new() -> Self {
        Self {
            lines: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    const fn is_full(&self) -> bool {
        self.lines.len() >= CHUNK_SIZE
    }
}

/// Line-oriented text storage.
///
/// The rope always holds at least one (possibly empty) line, mirroring how an
/// editor treats an empty document as a single empty line.
#[derive(Debug, Clone)]
pub struct TextRope {
    chunks: Vec<Chunk>,
    total_lines: usize,
    byte_len: usize,
}

impl TextRope {
    /// Build a rope from text. Lines are split on `\n`.
    pub fn from_text(text: &str) -> Self {
        let mut rope = Self {
            chunks: Vec::new(),
            total_lines: 0,
            byte_len: text.len(),
        };
        for line in text.split('\n') {
            rope.push_line(line.to_owned());
        }
        rope
    }

    fn push_line(&mut self, line: String) {
        if self.chunks.last().is_none_or(Chunk::is_full) {
            self.chunks.push(Chunk::new());
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.lines.push(line);
            self.total_lines += 1;
        }
    }

    /// Append text at the end of the document.
    pub fn append(&mut self, text: &str) {
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if let Some(last) = self.chunks.last_mut().and_then(|c| c.lines.last_mut()) {
                last.push_str(first);
            }
        }
        for line in parts {
            self.push_line(line.to_owned());
        }
        self.byte_len += text.len();
    }

    /// Replace the whole document.
    pub fn replace(&mut self, text: &str) {
        *self = Self::from_text(text);
    }

    /// Number of lines (always at least 1).
    pub const fn line_count(&self) -> usize {
        self.total_lines
    }

    /// Byte length of the full text.
    pub const fn len(&self) -> usize {
        self.byte_len
    }

    /// Whether the document is empty.
    pub const fn is_empty(&self) -> bool {
        self.byte_len == 0
    }

    /// Get a line by 0-based index.
    pub fn line(&self, index: usize) -> Option<&str> {
        if index >= self.total_lines {
            return None;
        }
        self.chunks
            .get(index / CHUNK_SIZE)?
            .lines
            .get(index % CHUNK_SIZE)
            .map(String::as_str)
    }

    /// Number of graphemes in a line (0 for lines out of range).
    pub fn line_graphemes(&self, index: usize) -> usize {
        self.line(index).map_or(0, |l| l.graphemes(true).count())
    }

    /// Display width of the widest line, in columns.
    pub fn max_width(&self) -> usize {
        self.lines().map(UnicodeWidthStr::width).max().unwrap_or(0)
    }

    /// Iterate over all lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.lines.iter().map(String::as_str))
    }

    /// Reassemble the full text.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.byte_len);
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Number of chunks in use.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for TextRope {
    fn default() -> Self {
        Self::from_text("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rope_empty_has_one_line() {
        let rope = TextRope::default();
        assert_eq!(rope.line_count(), 1);
        assert_eq!(rope.line(0), Some(""));
        assert!(rope.is_empty());
    }

    #[test]
    fn test_rope_roundtrip_text() {
        let text = "fn main() {\n    println!(\"hi\");\n}\n";
        let rope = TextRope::from_text(text);
        assert_eq!(rope.line_count(), 4);
        assert_eq!(rope.text(), text);
        assert_eq!(rope.len(), text.len());
    }

    #[test]
    fn test_rope_chunks() {
        let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let rope = TextRope::from_text(&text);

        assert!(rope.chunk_count() > 1);
        assert_eq!(rope.line_count(), 201);
        assert_eq!(rope.line(150), Some("line 150"));
        assert_eq!(rope.line(201), None);
    }

    #[test]
    fn test_rope_append_continues_last_line() {
        let mut rope = TextRope::from_text("hel");
        rope.append("lo\nwor");
        rope.append("ld");
        assert_eq!(rope.line_count(), 2);
        assert_eq!(rope.text(), "hello\nworld");
        assert_eq!(rope.len(), 11);
    }

    #[test]
    fn test_rope_widths() {
        let rope = TextRope::from_text("ab\n漢字漢\ne\u{301}");
        assert_eq!(rope.max_width(), 6);
        assert_eq!(rope.line_graphemes(2), 1);
        assert_eq!(rope.line_graphemes(9), 0);
    }
}
