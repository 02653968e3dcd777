/// A source location: file ID + byte offset range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }
}

/// Byte offsets of line starts, for turning line/column positions
/// (from the extractor and from `proc-macro2` spans) into [`Span`]s.
#[derive(Clone, Debug)]
pub struct LineIndex {
    file_id: u16,
    starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(file_id: u16, text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        Self {
            file_id,
            starts,
            len: text.len() as u32,
        }
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }

    /// Span covering the whole of the zero-based `line` (without newline).
    pub fn line(&self, line: usize) -> Span {
        let Some(&start) = self.starts.get(line) else {
            return Span::new(self.file_id, self.len, self.len);
        };
        let end = self
            .starts
            .get(line + 1)
            .map(|next| next.saturating_sub(1))
            .unwrap_or(self.len);
        Span::new(self.file_id, start, end.max(start))
    }

    /// Byte offset of a one-based line and zero-based column.
    pub fn offset(&self, line: usize, column: usize) -> u32 {
        let idx = line.saturating_sub(1);
        match self.starts.get(idx) {
            Some(&start) => (start + column as u32).min(self.len),
            None => self.len,
        }
    }

    /// Span of a `proc-macro2` span, as parsed from the same text.
    pub fn span_of(&self, span: proc_macro2::Span) -> Span {
        let (s, e) = (span.start(), span.end());
        let start = self.offset(s.line, s.column);
        let end = self.offset(e.line, e.column).max(start);
        Span::new(self.file_id, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_spans() {
        let idx = LineIndex::new(3, "ab\ncde\n\nf");
        assert_eq!(idx.line(0), Span::new(3, 0, 2));
        assert_eq!(idx.line(1), Span::new(3, 3, 6));
        assert_eq!(idx.line(2), Span::new(3, 7, 7));
        assert_eq!(idx.line(3), Span::new(3, 8, 9));
        assert_eq!(idx.line(9), Span::new(3, 9, 9));
    }

    #[test]
    fn test_offset_one_based_lines() {
        let idx = LineIndex::new(0, "fn a() {}\nfn b() {}\n");
        assert_eq!(idx.offset(1, 0), 0);
        assert_eq!(idx.offset(2, 3), 13);
        assert_eq!(idx.offset(40, 0), 20);
    }
}
