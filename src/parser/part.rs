//! Recursive MIME part tree construction.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use tracing::{debug, warn};

use super::header::{parse_header_block, strip_angle_brackets, HeaderField, HeaderKind};
use super::lines::LineIndex;

/// Default nesting limit for multipart recursion (adversarial input can
/// nest boundaries arbitrarily deep).
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// One node of a decoded message: its headers, its body lines, and, for
/// multipart nodes, its children in boundary order.
#[derive(Debug, Clone)]
pub struct Part {
    headers: Vec<HeaderField>,
    body: LineIndex,
    children: Vec<Part>,
}

impl Part {
    /// Build a part (and its subtree) from the lines of a header+body region.
    pub fn build(lines: LineIndex) -> Self {
        Self::build_with_depth(lines, DEFAULT_MAX_DEPTH)
    }

    /// Like [`Part::build`], turning parts nested deeper than `max_depth`
    /// into leaves.
    pub fn build_with_depth(lines: LineIndex, max_depth: usize) -> Self {
        Self::build_at(lines, 0, max_depth)
    }

    fn build_at(lines: LineIndex, depth: usize, max_depth: usize) -> Self {
        let (header_lines, body) = match lines.first_empty() {
            Some(blank) => (lines.slice(0..blank), lines.slice(blank + 1..lines.len())),
            None => (lines.clone(), lines.slice(lines.len()..lines.len())),
        };

        let headers = parse_header_block(&header_lines);
        let mut part = Self {
            headers,
            body,
            children: Vec::new(),
        };

        let Some(boundary) = part.header(HeaderKind::ContentType).and_then(HeaderField::boundary)
        else {
            return part;
        };

        if depth >= max_depth {
            warn!(depth, boundary = %boundary, "Multipart nesting too deep, keeping part as a leaf");
            return part;
        }

        part.children = part
            .body
            .separated_by(&boundary)
            .into_iter()
            .map(|group| Self::build_at(group, depth + 1, max_depth))
            .collect();

        debug!(
            depth,
            boundary = %boundary,
            children = part.children.len(),
            "Built multipart node"
        );
        part
    }

    /// All header fields, in source order.
    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    /// The first header of the given kind.
    pub fn header(&self, kind: HeaderKind) -> Option<&HeaderField> {
        self.headers.iter().find(|h| h.kind() == kind)
    }

    /// The first header with the given name (case-insensitive), for names
    /// outside the known vocabulary.
    pub fn header_named(&self, name: &str) -> Option<&HeaderField> {
        self.headers.iter().find(|h| h.is_named(name))
    }

    /// Child parts; empty for a leaf.
    pub fn children(&self) -> &[Part] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Raw `Content-Type` body, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header(HeaderKind::ContentType).map(HeaderField::raw_body)
    }

    /// Lower-cased media type without parameters. Parts without a
    /// `Content-Type` are `text/plain` (RFC 2045 §5.2).
    pub fn mime_type(&self) -> String {
        self.header(HeaderKind::ContentType)
            .map(HeaderField::value)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "text/plain".to_string())
    }

    /// `true` if the `Content-Type` body contains `needle` (ASCII
    /// case-insensitive substring match).
    pub fn has_content_type(&self, needle: &str) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
    }

    /// `Content-ID` value without angle brackets.
    pub fn content_id(&self) -> Option<&str> {
        self.header(HeaderKind::ContentId)
            .map(|h| strip_angle_brackets(h.raw_body()))
            .filter(|id| !id.is_empty())
    }

    /// Lower-cased `Content-Transfer-Encoding`, if present.
    pub fn transfer_encoding(&self) -> Option<String> {
        self.header(HeaderKind::ContentTransferEncoding)
            .map(|h| h.raw_body().to_ascii_lowercase())
    }

    /// Attachment file name from `Content-Disposition` or, failing that,
    /// the `name` parameter of `Content-Type`.
    pub fn filename(&self) -> Option<String> {
        self.header_named("content-disposition")
            .and_then(|h| h.parameter("filename"))
            .or_else(|| self.header(HeaderKind::ContentType)?.parameter("name"))
            .filter(|name| !name.is_empty())
    }

    /// Disposition (`inline`, `attachment`), lower-cased.
    pub fn disposition(&self) -> Option<String> {
        self.header_named("content-disposition")
            .map(HeaderField::value)
            .filter(|v| !v.is_empty())
    }

    /// `true` for leaves that carry a file rather than message text:
    /// an explicit attachment disposition, a file name, a content
    /// identifier, or a non-text media type.
    pub fn is_attachment(&self) -> bool {
        if !self.is_leaf() {
            return false;
        }
        self.disposition().as_deref() == Some("attachment")
            || self.filename().is_some()
            || self.content_id().is_some()
            || !self.mime_type().starts_with("text/")
    }

    /// Body lines of this part.
    pub fn body_lines(&self) -> &LineIndex {
        &self.body
    }

    /// Body bytes exactly as they appear in the message buffer.
    pub fn raw_body(&self) -> &[u8] {
        self.body.bytes()
    }

    /// Body as display text (lines rejoined with `\n`).
    pub fn body_text(&self) -> String {
        self.body.joined()
    }

    /// Decoded content: base64 bodies are decoded, everything else is
    /// returned as is. A base64 body that does not decode is returned raw.
    pub fn content(&self) -> Vec<u8> {
        if self.transfer_encoding().as_deref() != Some("base64") {
            return self.raw_body().to_vec();
        }

        let compact: Vec<u8> = self
            .raw_body()
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        match STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(trim_padding(&compact)))
        {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Invalid base64 body, returning raw bytes");
                self.raw_body().to_vec()
            }
        }
    }

    /// Decoded content as text (lossy UTF-8).
    pub fn content_text(&self) -> String {
        String::from_utf8_lossy(&self.content()).into_owned()
    }

    /// Depth-first iterator over this part and every descendant, each
    /// parent before its children.
    pub fn iter(&self) -> Parts<'_> {
        Parts { stack: vec![self] }
    }

    /// First part in depth-first order matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&Part) -> bool) -> Option<&Part> {
        self.iter().find(|p| predicate(p))
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != b'=').map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Pre-order traversal of a part tree.
pub struct Parts<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Parts<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}
