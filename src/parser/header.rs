//! Header fields: name/body splitting, classification against the
//! well-known vocabulary, folding, and structured accessors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::trace;

use super::lines::LineIndex;
use super::normalize::decode_encoded_words;

/// The header names the decoder knows about.
///
/// Anything else is [`HeaderKind::Unknown`] and is still reachable through
/// [`HeaderField::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderKind {
    ReturnPath,
    Received,
    AuthenticationResults,
    ReceivedSpf,
    Subject,
    From,
    To,
    Date,
    Sender,
    ReplyTo,
    MessageId,
    Mailer,
    ListUnsubscribe,
    ContentType,
    ContentTransferEncoding,
    ContentId,
    Unknown,
}

impl HeaderKind {
    /// Every kind with a canonical name, in lookup order.
    pub const KNOWN: [HeaderKind; 16] = [
        HeaderKind::ReturnPath,
        HeaderKind::Received,
        HeaderKind::AuthenticationResults,
        HeaderKind::ReceivedSpf,
        HeaderKind::Subject,
        HeaderKind::From,
        HeaderKind::To,
        HeaderKind::Date,
        HeaderKind::Sender,
        HeaderKind::ReplyTo,
        HeaderKind::MessageId,
        HeaderKind::Mailer,
        HeaderKind::ListUnsubscribe,
        HeaderKind::ContentType,
        HeaderKind::ContentTransferEncoding,
        HeaderKind::ContentId,
    ];

    /// Classify a header name (case-insensitive).
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::KNOWN
            .into_iter()
            .find(|kind| kind.canonical_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .unwrap_or(HeaderKind::Unknown)
    }

    /// Lower-case wire name, `None` for [`HeaderKind::Unknown`].
    pub fn canonical_name(self) -> Option<&'static str> {
        Some(match self {
            HeaderKind::ReturnPath => "return-path",
            HeaderKind::Received => "received",
            HeaderKind::AuthenticationResults => "authentication-results",
            HeaderKind::ReceivedSpf => "received-spf",
            HeaderKind::Subject => "subject",
            HeaderKind::From => "from",
            HeaderKind::To => "to",
            HeaderKind::Date => "date",
            HeaderKind::Sender => "sender",
            HeaderKind::ReplyTo => "reply-to",
            HeaderKind::MessageId => "message-id",
            HeaderKind::Mailer => "x-mailer",
            HeaderKind::ListUnsubscribe => "list-unsubscribe",
            HeaderKind::ContentType => "content-type",
            HeaderKind::ContentTransferEncoding => "content-transfer-encoding",
            HeaderKind::ContentId => "content-id",
            HeaderKind::Unknown => return None,
        })
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name().unwrap_or("unknown"))
    }
}

/// One parsed header line.
#[derive(Debug, Clone)]
pub struct HeaderField {
    name: String,
    kind: HeaderKind,
    raw_body: String,
    decoded_body: OnceLock<String>,
}

impl HeaderField {
    /// Parse `Name: body`.
    ///
    /// The name is everything before the first colon; the body is the rest
    /// (later colons included), trimmed. A line without a colon becomes a
    /// field with that line as its name and an empty body.
    pub fn parse(line: &str) -> Self {
        let (name, body) = line.split_once(':').unwrap_or((line, ""));
        let name = name.trim();
        Self {
            name: name.to_string(),
            kind: HeaderKind::from_name(name),
            raw_body: body.trim().to_string(),
            decoded_body: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    /// The body exactly as it appeared (trimmed).
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// The body with RFC 2047 encoded words decoded, computed on first use.
    pub fn decoded_body(&self) -> &str {
        self.decoded_body
            .get_or_init(|| decode_encoded_words(&self.raw_body))
    }

    /// `true` if this field has the given name (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// The body read as a comma-separated list of `key=value` pairs.
    ///
    /// Keys are trimmed and lower-cased; values lose one level of
    /// surrounding double quotes. Commas inside quotes do not split.
    /// Segments without `=` are skipped. A later duplicate key wins.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        split_unquoted(&self.raw_body, ',')
            .into_iter()
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                Some((key.trim().to_lowercase(), unquote(value.trim()).to_string()))
            })
            .collect()
    }

    /// The multipart boundary token, if the body declares one.
    ///
    /// Looks for an attribute whose key contains `boundary`, cuts its value
    /// at the first `;` and strips quotes. When `boundary` is not the first
    /// parameter it is taken from the `;` parameter list instead. An empty
    /// token counts as absent.
    pub fn boundary(&self) -> Option<String> {
        self.attributes()
            .into_iter()
            .find(|(key, _)| key.contains("boundary"))
            .map(|(_, value)| {
                let token = value.split(';').next().unwrap_or_default();
                token.trim().trim_matches('"').to_string()
            })
            .or_else(|| self.parameter("boundary"))
            .filter(|token| !token.is_empty())
    }

    /// The main value before any `;` parameters, lower-cased
    /// (`"text/html"` for `Text/HTML; charset=utf-8`).
    pub fn value(&self) -> String {
        self.raw_body
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    /// A `;`-separated parameter such as `charset`, `name` or `filename`,
    /// unquoted and with encoded words decoded.
    pub fn parameter(&self, name: &str) -> Option<String> {
        split_unquoted(&self.raw_body, ';')
            .into_iter()
            .skip(1)
            .filter_map(|segment| segment.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| decode_encoded_words(unquote(value.trim())))
    }
}

/// Parse a header block, joining folded continuation lines.
///
/// A line starting with a space or tab continues the previous field and is
/// appended to it with a single space. Lines that are not readable text
/// are skipped.
pub fn parse_header_block(lines: &LineIndex) -> Vec<HeaderField> {
    let mut fields = Vec::new();
    let mut pending: Option<String> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            trace!(line = i, "Skipping unreadable header line");
            continue;
        }
        if line.starts_with([' ', '\t']) {
            if let Some(current) = pending.as_mut() {
                current.push(' ');
                current.push_str(line.trim());
                continue;
            }
        }
        if let Some(done) = pending.replace(line.to_string()) {
            fields.push(HeaderField::parse(&done));
        }
    }

    if let Some(done) = pending {
        fields.push(HeaderField::parse(&done));
    }
    fields
}

/// Extract the content between `<` and `>` (Message-ID, Content-ID).
/// Text without brackets is returned trimmed.
pub fn strip_angle_brackets(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(len) = trimmed[start + 1..].find('>') {
            return trimmed[start + 1..start + 1 + len].trim();
        }
    }
    trimmed
}

/// Remove one pair of surrounding double quotes.
fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Split on `sep`, ignoring separators inside double quotes.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_parse_splits_on_first_colon() {
        let field = HeaderField::parse("Subject: Re: meeting at 10:30 ");
        assert_eq!(field.name(), "Subject");
        assert_eq!(field.kind(), HeaderKind::Subject);
        assert_eq!(field.raw_body(), "Re: meeting at 10:30");
    }

    #[test]
    fn test_kind_lookup_is_case_insensitive() {
        assert_eq!(HeaderKind::from_name("CONTENT-TYPE"), HeaderKind::ContentType);
        assert_eq!(HeaderKind::from_name("x-mailer"), HeaderKind::Mailer);
        assert_eq!(HeaderKind::from_name("Received-SPF"), HeaderKind::ReceivedSpf);
        assert_eq!(HeaderKind::from_name("X-Custom"), HeaderKind::Unknown);
    }

    #[test]
    fn test_every_known_kind_round_trips_its_name() {
        for kind in HeaderKind::KNOWN {
            let name = kind.canonical_name().unwrap();
            assert_eq!(HeaderKind::from_name(name), kind);
        }
        assert_eq!(HeaderKind::Unknown.canonical_name(), None);
    }

    #[test]
    fn test_unknown_header_keeps_name() {
        let field = HeaderField::parse("X-Spam-Score: 0.1");
        assert_eq!(field.kind(), HeaderKind::Unknown);
        assert!(field.is_named("x-spam-score"));
        assert_eq!(field.raw_body(), "0.1");
    }

    #[test]
    fn test_line_without_colon() {
        let field = HeaderField::parse("garbage");
        assert_eq!(field.name(), "garbage");
        assert_eq!(field.raw_body(), "");
    }

    #[test]
    fn test_decoded_body() {
        let field = HeaderField::parse("Subject: =?utf-8?Q?Hi_there?=");
        assert_eq!(field.raw_body(), "=?utf-8?Q?Hi_there?=");
        assert_eq!(field.decoded_body(), "Hi there");
    }

    #[test]
    fn test_attributes() {
        let field = HeaderField::parse(r#"X-Test: a=1, B = "two, three" ,novalue, c="q""#);
        let attrs = field.attributes();
        assert_eq!(attrs.get("a").map(String::as_str), Some("1"));
        assert_eq!(attrs.get("b").map(String::as_str), Some("two, three"));
        assert_eq!(attrs.get("c").map(String::as_str), Some("q"));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_boundary_quoted_with_trailing_params() {
        let field = HeaderField::parse(
            r#"Content-Type: multipart/mixed; boundary="----=_Part_1"; charset=utf-8"#,
        );
        assert_eq!(field.boundary().as_deref(), Some("----=_Part_1"));

        let field = HeaderField::parse(
            r#"Content-Type: multipart/related; boundary="rel"; type="text/html""#,
        );
        assert_eq!(field.boundary().as_deref(), Some("rel"));
    }

    #[test]
    fn test_boundary_as_last_parameter() {
        let field = HeaderField::parse(
            r#"Content-Type: multipart/signed; protocol="application/pgp-signature"; micalg=pgp-sha256; boundary="sig""#,
        );
        assert_eq!(field.boundary().as_deref(), Some("sig"));

        let field = HeaderField::parse(
            r#"Content-Type: multipart/related; type="text/html"; boundary=rel"#,
        );
        assert_eq!(field.boundary().as_deref(), Some("rel"));

        let field = HeaderField::parse(r#"Content-Type: multipart/mixed; charset=utf-8; boundary="""#);
        assert!(field.boundary().is_none());
    }

    #[test]
    fn test_boundary_bare() {
        let field = HeaderField::parse("Content-Type: multipart/mixed; boundary=XYZ");
        assert_eq!(field.boundary().as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_boundary_absent_or_empty() {
        assert!(HeaderField::parse("Content-Type: text/plain; charset=utf-8")
            .boundary()
            .is_none());
        assert!(HeaderField::parse(r#"Content-Type: multipart/mixed; boundary="""#)
            .boundary()
            .is_none());
    }

    #[test]
    fn test_value_and_parameter() {
        let field = HeaderField::parse(
            r#"Content-Disposition: Attachment; filename="=?utf-8?Q?r=C3=A9sum=C3=A9.pdf?="; size=10"#,
        );
        assert_eq!(field.value(), "attachment");
        assert_eq!(field.parameter("FILENAME").as_deref(), Some("résumé.pdf"));
        assert_eq!(field.parameter("size").as_deref(), Some("10"));
        assert!(field.parameter("missing").is_none());
    }

    #[test]
    fn test_header_block_unfolds_continuations() {
        let text = "Content-Type: multipart/mixed;\n\tboundary=\"abc\"\nSubject: one\n two\nTo: x";
        let lines = LineIndex::split(Arc::from(text.as_bytes()), b"\n").unwrap();
        let fields = parse_header_block(&lines);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].raw_body(), "multipart/mixed; boundary=\"abc\"");
        assert_eq!(fields[0].boundary().as_deref(), Some("abc"));
        assert_eq!(fields[1].raw_body(), "one two");
    }

    #[test]
    fn test_strip_angle_brackets() {
        assert_eq!(strip_angle_brackets(" <img1@example.com> "), "img1@example.com");
        assert_eq!(strip_angle_brackets("img1@example.com"), "img1@example.com");
        assert_eq!(strip_angle_brackets("<unterminated"), "<unterminated");
    }
}
