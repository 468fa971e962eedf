//! The decoded message and its read-only query surface.

use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::attachment::AttachmentMeta;
use crate::error::{MimeError, Result};
use crate::parser::date::parse_date;
use crate::parser::header::{strip_angle_brackets, HeaderField, HeaderKind};
use crate::parser::lines::LineIndex;
use crate::parser::normalize::normalize_transport;
use crate::parser::part::{Part, DEFAULT_MAX_DEPTH};

/// A fully decoded message.
///
/// Owns the normalized payload; every [`Part`] in the tree indexes into
/// that one buffer. Immutable once built, so it can be shared across
/// threads for reading.
#[derive(Debug, Clone)]
pub struct Message {
    source: Arc<[u8]>,
    root: Part,
}

impl Message {
    /// Decode a raw RFC 5322 payload.
    ///
    /// Fails only if the input is not UTF-8/ASCII text or has no
    /// multi-line structure. Every other defect degrades to a best-effort
    /// tree.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_with_depth(raw, DEFAULT_MAX_DEPTH)
    }

    /// Like [`Message::parse`], with an explicit multipart nesting limit.
    pub fn parse_with_depth(raw: &[u8], max_depth: usize) -> Result<Self> {
        std::str::from_utf8(raw).map_err(|e| MimeError::Decode {
            offset: e.valid_up_to(),
        })?;

        let source: Arc<[u8]> = normalize_transport(raw).into();
        let lines = LineIndex::split(Arc::clone(&source), b"\n")?;
        let root = Part::build_with_depth(lines, max_depth);

        debug!(
            bytes = raw.len(),
            parts = root.iter().count(),
            "Decoded message"
        );
        Ok(Self { source, root })
    }

    /// The root of the part tree.
    pub fn root(&self) -> &Part {
        &self.root
    }

    /// The normalized buffer the part tree indexes into.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decoded body of a top-level header.
    pub fn header(&self, kind: HeaderKind) -> Option<&str> {
        self.root.header(kind).map(HeaderField::decoded_body)
    }

    /// Decoded `Subject`, from the top-level headers only.
    pub fn subject(&self) -> Option<&str> {
        self.header(HeaderKind::Subject)
    }

    pub fn from(&self) -> Option<&str> {
        self.header(HeaderKind::From)
    }

    pub fn to(&self) -> Option<&str> {
        self.header(HeaderKind::To)
    }

    /// `Message-ID` without angle brackets.
    pub fn message_id(&self) -> Option<&str> {
        self.root
            .header(HeaderKind::MessageId)
            .map(|h| strip_angle_brackets(h.raw_body()))
    }

    /// Parsed `Date` header.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.root
            .header(HeaderKind::Date)
            .and_then(|h| parse_date(h.raw_body()))
    }

    /// First part, depth-first and parent before children, whose
    /// `Content-Type` contains `mime_type` (case-insensitive substring).
    pub fn part_of_type(&self, mime_type: &str) -> Option<&Part> {
        self.root.find(|p| p.has_content_type(mime_type))
    }

    /// First leaf whose `Content-ID` equals `content_id`.
    ///
    /// Angle brackets and a `cid:` URL prefix are ignored on both sides, so
    /// `"<logo@x>"`, `"logo@x"` and `"cid:logo@x"` all find the same part.
    pub fn part_with_content_id(&self, content_id: &str) -> Option<&Part> {
        let wanted = normalize_cid(content_id);
        if wanted.is_empty() {
            return None;
        }
        self.root
            .find(|p| p.is_leaf() && p.content_id().map(normalize_cid) == Some(wanted))
    }

    /// HTML for rendering.
    ///
    /// The first `text/html` leaf if there is one; otherwise the first
    /// `text/plain` leaf, escaped and wrapped in a minimal HTML document;
    /// otherwise `None`.
    pub fn html_body(&self) -> Option<String> {
        if let Some(html) = self.first_leaf_of_type("text/html") {
            return Some(html.content_text());
        }
        self.first_leaf_of_type("text/plain")
            .map(|plain| wrap_plain_text(&plain.content_text()))
    }

    /// Text of the first `text/plain` leaf.
    pub fn plain_body(&self) -> Option<String> {
        self.first_leaf_of_type("text/plain")
            .map(Part::content_text)
    }

    /// [`Message::html_body`] with every `src="cid:…"` reference to an
    /// inline part replaced by a `data:` URI carrying that part's content.
    pub fn html_body_with_inline_images(&self) -> Option<String> {
        let mut html = self.html_body()?;
        for part in self.root.iter().filter(|p| p.is_leaf()) {
            let Some(cid) = part.content_id() else {
                continue;
            };
            let data_uri = format!(
                "data:{};base64,{}",
                part.mime_type(),
                STANDARD.encode(part.content())
            );
            for quote in ['"', '\''] {
                let reference = format!("src={quote}cid:{cid}{quote}");
                if html.contains(&reference) {
                    html = html.replace(&reference, &format!("src=\"{data_uri}\""));
                }
            }
        }
        Some(html)
    }

    /// `true` if any part of the message is `multipart/mixed`.
    pub fn is_multipart(&self) -> bool {
        self.part_of_type("multipart/mixed").is_some()
    }

    /// Metadata for every attachment or inline file, in tree order.
    pub fn attachments(&self) -> Vec<AttachmentMeta> {
        self.root
            .iter()
            .filter(|p| p.is_attachment())
            .enumerate()
            .map(|(idx, part)| AttachmentMeta::from_part(idx, part))
            .collect()
    }

    /// First leaf whose media type is `mime_type`; leaves without a
    /// `Content-Type` count as `text/plain`.
    fn first_leaf_of_type(&self, mime_type: &str) -> Option<&Part> {
        self.root
            .find(|p| p.is_leaf() && p.mime_type() == mime_type)
    }
}

impl FromStr for Message {
    type Err = MimeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

fn normalize_cid(id: &str) -> &str {
    let id = strip_angle_brackets(id);
    match id.get(..4) {
        Some(scheme) if scheme.eq_ignore_ascii_case("cid:") => strip_angle_brackets(&id[4..]),
        _ => id,
    }
}

/// Escape plain text and wrap it in a minimal HTML document, keeping
/// line breaks.
fn wrap_plain_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 32);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\n' => escaped.push_str("<br />"),
            c => escaped.push(c),
        }
    }
    format!("<html><body>{escaped}</body></html>")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "Content-Type: multipart/mixed; boundary=XYZ\n\n--XYZ\nContent-Type: text/plain\n\nHello\n--XYZ\nContent-Type: text/html\n\n<b>Hi</b>\n--XYZ--";

    #[test]
    fn test_mixed_example() {
        let msg: Message = MIXED.parse().unwrap();
        let root = msg.root();
        assert_eq!(root.children().len(), 2);
        assert!(root.children()[0].is_leaf());
        assert_eq!(root.children()[0].mime_type(), "text/plain");
        assert_eq!(root.children()[0].body_text(), "Hello");
        assert_eq!(root.children()[1].mime_type(), "text/html");
        assert_eq!(root.children()[1].body_text(), "<b>Hi</b>");
        assert_eq!(msg.html_body().as_deref(), Some("<b>Hi</b>"));
        assert!(msg.is_multipart());
    }

    #[test]
    fn test_plain_only_message_gets_wrapped() {
        let msg = Message::parse(b"Subject: x\nContent-Type: text/plain\n\nfish & <chips>\nbye").unwrap();
        assert!(msg.part_of_type("text/html").is_none());
        assert_eq!(
            msg.html_body().as_deref(),
            Some("<html><body>fish &amp; &lt;chips&gt;<br />bye</body></html>")
        );
        assert!(!msg.is_multipart());
    }

    #[test]
    fn test_message_without_content_type_is_plain_text() {
        let msg = Message::parse(b"Subject: hi\nFrom: a@b\n\nHello there").unwrap();
        assert_eq!(msg.root().mime_type(), "text/plain");
        assert_eq!(msg.plain_body().as_deref(), Some("Hello there"));
        assert_eq!(
            msg.html_body().as_deref(),
            Some("<html><body>Hello there</body></html>")
        );
        // The lookup by type only sees declared Content-Type headers
        assert!(msg.part_of_type("text/plain").is_none());
    }

    #[test]
    fn test_headerless_section_is_plain_text() {
        let msg = Message::parse(
            b"Content-Type: multipart/mixed; boundary=b\n\n\
              --b\n\nno headers here\n\
              --b\nContent-Type: image/png\n\nPNG\n--b--",
        )
        .unwrap();
        assert_eq!(msg.plain_body().as_deref(), Some("no headers here"));
    }

    #[test]
    fn test_q_escapes_in_subject() {
        let msg = Message::parse(b"Subject: =?utf-8?Q?Hello=20World?=\n\nbody").unwrap();
        assert_eq!(msg.subject(), Some("Hello World"));
        let msg = Message::parse(b"Subject: =?utf-8?Q?snake=5Fcase?=\n\nbody").unwrap();
        assert_eq!(msg.subject(), Some("snake_case"));
    }

    #[test]
    fn test_no_text_part_has_no_html() {
        let msg =
            Message::parse(b"Content-Type: image/png\nContent-Transfer-Encoding: base64\n\niVBORw==").unwrap();
        assert!(msg.html_body().is_none());
        assert!(msg.plain_body().is_none());
    }

    #[test]
    fn test_subject_is_top_level_only() {
        let msg = Message::parse(
            b"Content-Type: multipart/mixed; boundary=b\n\n--b\nSubject: inner\n\nx\n--b--",
        )
        .unwrap();
        assert!(msg.subject().is_none());
    }

    #[test]
    fn test_unterminated_encoded_word_subject() {
        let msg = Message::parse(b"Subject: =?utf-8?Q?Hi_there\n\nbody").unwrap();
        assert_eq!(msg.subject(), Some("=?utf-8?Q?Hi_there"));
    }

    #[test]
    fn test_part_with_content_id() {
        let msg = Message::parse(
            b"Content-Type: multipart/related; boundary=r\n\n\
              --r\nContent-Type: text/html\n\n<img src=\"cid:logo@x\">\n\
              --r\nContent-Type: image/gif\nContent-ID: <logo@x>\n\
              Content-Transfer-Encoding: base64\n\nR0lGODlh\n--r--",
        )
        .unwrap();
        let part = msg.part_with_content_id("logo@x").unwrap();
        assert_eq!(part.mime_type(), "image/gif");
        assert!(msg.part_with_content_id("<logo@x>").is_some());
        assert!(msg.part_with_content_id("cid:logo@x").is_some());
        assert!(msg.part_with_content_id("other@x").is_none());
        assert!(msg.part_with_content_id("").is_none());

        let html = msg.html_body_with_inline_images().unwrap();
        assert_eq!(html, "<img src=\"data:image/gif;base64,R0lGODlh\">");
    }

    #[test]
    fn test_header_accessors() {
        let msg = Message::parse(
            b"From: =?utf-8?Q?Jos=C3=A9?= <jose@example.com>\nTo: ana@example.com\n\
              Message-ID: <abc@example.com>\nDate: Thu, 04 Jan 2024 10:00:00 +0000\n\nbody",
        )
        .unwrap();
        assert_eq!(msg.from(), Some("José <jose@example.com>"));
        assert_eq!(msg.to(), Some("ana@example.com"));
        assert_eq!(msg.message_id(), Some("abc@example.com"));
        assert!(msg.date().is_some());
    }

    #[test]
    fn test_fatal_failures() {
        assert!(matches!(
            Message::parse(b"one line only"),
            Err(MimeError::TooFewLines { .. })
        ));
        assert!(matches!(
            Message::parse(b"Subject: \xff\n\nbody"),
            Err(MimeError::Decode { offset: 9 })
        ));
    }

    #[test]
    fn test_message_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Message>();
    }
}
