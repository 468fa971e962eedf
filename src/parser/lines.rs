//! Zero-copy line splitting over a shared message buffer.
//!
//! A [`LineIndex`] never copies message bytes: it keeps a reference-counted
//! handle to the whole buffer plus the byte ranges of each line. Sub-regions
//! (a part's body, a multipart group) are new indexes over the same buffer.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{MimeError, Result};

/// Ordered, non-overlapping line ranges into one immutable buffer.
///
/// Ranges exclude the separator. Cloning is cheap: the buffer is shared.
#[derive(Debug, Clone)]
pub struct LineIndex {
    buffer: Arc<[u8]>,
    lines: Vec<Range<usize>>,
}

impl LineIndex {
    /// Split `buffer` on every occurrence of `separator`.
    ///
    /// The last line runs to the end of the buffer, so a trailing separator
    /// yields a final empty line. Fewer than two lines cannot hold a header
    /// block and fail with [`MimeError::TooFewLines`].
    pub fn split(buffer: Arc<[u8]>, separator: &[u8]) -> Result<Self> {
        let mut lines = Vec::new();
        let mut cursor = 0;

        if !separator.is_empty() {
            while let Some(pos) = find(&buffer[cursor..], separator) {
                lines.push(cursor..cursor + pos);
                cursor += pos + separator.len();
            }
        }
        lines.push(cursor..buffer.len());

        if lines.len() < 2 {
            return Err(MimeError::TooFewLines { lines: lines.len() });
        }

        Ok(Self { buffer, lines })
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// `true` if the index holds no lines at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Byte range of line `index` within the shared buffer.
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        self.lines.get(index).cloned()
    }

    /// Raw bytes of line `index`.
    pub fn line_bytes(&self, index: usize) -> Option<&[u8]> {
        self.lines.get(index).map(|r| &self.buffer[r.clone()])
    }

    /// Line `index` as text.
    ///
    /// UTF-8 first, then plain ASCII; a line that is neither reads as an
    /// empty string. Out-of-range indexes also read as empty.
    pub fn line(&self, index: usize) -> &str {
        self.line_bytes(index).map(bytes_as_text).unwrap_or("")
    }

    /// Iterate over every line as text.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.lines.len()).map(move |i| self.line(i))
    }

    /// Position of the first empty line, if any.
    pub fn first_empty(&self) -> Option<usize> {
        self.lines.iter().position(|r| r.is_empty())
    }

    /// A new index over the contiguous lines in `range` (clamped to bounds).
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        Self {
            buffer: Arc::clone(&self.buffer),
            lines: self.lines[start..end].to_vec(),
        }
    }

    /// The original bytes spanned by every line of this index.
    ///
    /// This is one borrowed slice from the start of the first line to the
    /// end of the last, so interior separators appear exactly as they were
    /// in the buffer and no separator is appended after the last line.
    pub fn bytes(&self) -> &[u8] {
        match (self.lines.first(), self.lines.last()) {
            (Some(first), Some(last)) => &self.buffer[first.start..last.end],
            _ => &[],
        }
    }

    /// Every line as text, rejoined with `\n` for display.
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }

    /// Group lines into the runs delimited by `--<boundary>` markers.
    ///
    /// A new run starts immediately after every line that begins with the
    /// marker. Lines before the first marker are the multipart preamble and
    /// are never emitted. Empty runs (consecutive markers) are skipped. A
    /// closing marker (`--<boundary>--`) ends the body and whatever follows
    /// it is the epilogue; if the closing marker is missing, the trailing
    /// run is emitted so truncated messages keep their last part.
    pub fn separated_by(&self, boundary: &str) -> Vec<LineIndex> {
        let marker = format!("--{boundary}");
        let closing = format!("--{boundary}--");
        let mut groups = Vec::new();
        let mut start: Option<usize> = None;

        for i in 0..self.lines.len() {
            let line = self.line_bytes(i).unwrap_or_default();
            if !line.starts_with(marker.as_bytes()) {
                continue;
            }
            if let Some(s) = start {
                if i > s {
                    groups.push(self.slice(s..i));
                }
            }
            if line.trim_ascii_end() == closing.as_bytes() {
                return groups;
            }
            start = Some(i + 1);
        }

        if let Some(s) = start {
            if s < self.lines.len() {
                groups.push(self.slice(s..self.lines.len()));
            }
        }
        groups
    }
}

/// Interpret bytes as text, or nothing.
///
/// ASCII is a subset of UTF-8, so one validation covers both encodings.
fn bytes_as_text(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap_or("")
}

/// Offset of the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
