use std::fmt;

/// A half-open byte range into a source buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The smallest span covering both `self` and `other`.
    pub fn cover(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A 1-based line/column pair. Columns count code points, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

/// The dominant line terminator style of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file is not valid UTF-8 (first invalid byte at offset {offset})")]
    InvalidEncoding { offset: usize },
}

/// An immutable UTF-8 source buffer with a precomputed line index.
///
/// The buffer is created once per file and shared read-only by the lexer,
/// the parser, the rule engine and the reporter. Offsets used throughout the
/// crate are byte offsets into this buffer; `byte_to_line_col` translates
/// them for display.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    text: String,
    /// Byte offset of the first code point of each line.
    line_starts: Vec<usize>,
    had_bom: bool,
}

const BOM: &str = "\u{feff}";

impl SourceBuffer {
    pub fn new(text: String) -> Self {
        let (text, had_bom) = match text.strip_prefix(BOM) {
            Some(rest) => (rest.to_owned(), true),
            None => (text, false),
        };
        let line_starts = compute_line_starts(&text);
        Self {
            text,
            line_starts,
            had_bom,
        }
    }

    /// Validates `bytes` as UTF-8 and builds a buffer from it.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SourceError> {
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Self::new(text)),
            Err(err) => Err(SourceError::InvalidEncoding {
                offset: err.utf8_error().valid_up_to(),
            }),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the original input started with a byte order mark. The BOM is
    /// stripped from `text()` and re-emitted by the output writer.
    pub fn had_bom(&self) -> bool {
        self.had_bom
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.start..span.end]
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The line terminator style to use for output: CRLF if the input
    /// contains any CRLF, LF otherwise.
    pub fn line_ending(&self) -> LineEnding {
        if self.text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    /// Translates a byte offset into a 1-based (line, column) pair.
    /// The column counts code points from the line start.
    pub fn byte_to_line_col(&self, offset: usize) -> LineCol {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line];
        let col = self.text[line_start..offset].chars().count();
        LineCol {
            line: line + 1,
            col: col + 1,
        }
    }

    /// Inverse of [`byte_to_line_col`](Self::byte_to_line_col): the byte
    /// offset of a 1-based line/column pair. Columns past the end of the
    /// line clamp to the line end.
    pub fn line_col_to_byte(&self, pos: LineCol) -> Option<usize> {
        let span = self.line_span(pos.line)?;
        let mut offset = span.start;
        let mut col = 1;
        for c in self.text[span.start..span.end].chars() {
            if col == pos.col {
                return Some(offset);
            }
            offset += c.len_utf8();
            col += 1;
        }
        Some(offset)
    }

    /// Byte offset of the first code point of the 1-based `line`, if any.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)?).copied()
    }

    /// The span of the 1-based `line`, excluding its terminator.
    pub fn line_span(&self, line: usize) -> Option<Span> {
        let start = self.line_start(line)?;
        let end = match self.line_starts.get(line) {
            Some(&next) => {
                let mut end = next;
                if self.text[..end].ends_with('\n') {
                    end -= 1;
                }
                if self.text[..end].ends_with('\r') {
                    end -= 1;
                }
                end
            }
            None => self.text.len(),
        };
        Some(Span::new(start, end))
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => starts.push(i + 1),
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                starts.push(i + 1);
            }
            _ => {}
        }
        i += 1;
    }
    starts
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_col_translation() {
        let buf = SourceBuffer::new("class A {\n  int x;\n}\n".to_owned());
        assert_eq!(buf.line_count(), 4);
        assert_eq!(buf.byte_to_line_col(0), LineCol { line: 1, col: 1 });
        assert_eq!(buf.byte_to_line_col(6), LineCol { line: 1, col: 7 });
        assert_eq!(buf.byte_to_line_col(10), LineCol { line: 2, col: 1 });
        assert_eq!(buf.byte_to_line_col(12), LineCol { line: 2, col: 3 });
    }

    #[test]
    fn line_col_round_trips() {
        let buf = SourceBuffer::new("class A {\n  int x;\n}\n".to_owned());
        for offset in [0, 6, 10, 12, 19] {
            let pos = buf.byte_to_line_col(offset);
            assert_eq!(buf.line_col_to_byte(pos), Some(offset));
        }
    }

    #[test]
    fn columns_count_code_points() {
        let buf = SourceBuffer::new("int \u{00e9}x = 1;".to_owned());
        // `é` occupies two bytes but one column.
        let offset = buf.text().find('x').unwrap();
        assert_eq!(buf.byte_to_line_col(offset).col, 6);
    }

    #[test]
    fn mixed_terminators_count_once() {
        let buf = SourceBuffer::new("a\r\nb\rc\nd".to_owned());
        assert_eq!(buf.line_count(), 4);
        assert_eq!(buf.byte_to_line_col(3), LineCol { line: 2, col: 1 });
        assert_eq!(buf.byte_to_line_col(5), LineCol { line: 3, col: 1 });
        assert_eq!(buf.byte_to_line_col(7), LineCol { line: 4, col: 1 });
        assert_eq!(buf.line_ending(), LineEnding::CrLf);
    }

    #[test]
    fn bom_is_recorded_and_stripped() {
        let buf = SourceBuffer::new("\u{feff}class A {}".to_owned());
        assert!(buf.had_bom());
        assert!(buf.text().starts_with("class"));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = SourceBuffer::from_bytes(vec![b'a', 0xff, b'b']).unwrap_err();
        assert!(matches!(err, SourceError::InvalidEncoding { offset: 1 }));
    }

    #[test]
    fn line_span_excludes_terminator() {
        let buf = SourceBuffer::new("ab\r\ncd\n".to_owned());
        assert_eq!(buf.line_span(1), Some(Span::new(0, 2)));
        assert_eq!(buf.line_span(2), Some(Span::new(4, 6)));
    }
}
