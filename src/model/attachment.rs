//! Attachment metadata.
//!
//! Built from leaf parts on demand. The content itself stays in the
//! message buffer until it is exported.

use crate::parser::part::Part;

/// Metadata about an attachment or inline file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttachmentMeta {
    /// Filename of the attachment. Generated if missing from the headers.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: u64,

    /// Content-Transfer-Encoding (`base64`, `quoted-printable`, `7bit`, …),
    /// empty when the part does not declare one.
    pub encoding: String,

    /// Content-ID for inline attachments referenced from HTML.
    pub content_id: Option<String>,

    /// `true` if the part is inline (embedded in HTML), `false` if a regular attachment.
    pub is_inline: bool,
}

impl AttachmentMeta {
    /// Describe `part`, the `index`-th attachment of its message.
    pub fn from_part(index: usize, part: &Part) -> Self {
        let content_id = part.content_id().map(str::to_string);
        let is_inline = match part.disposition().as_deref() {
            Some(disposition) => disposition == "inline",
            None => content_id.is_some(),
        };

        Self {
            filename: part
                .filename()
                .unwrap_or_else(|| format!("attachment_{index}")),
            content_type: part.mime_type(),
            size: part.content().len() as u64,
            encoding: part.transfer_encoding().unwrap_or_default(),
            content_id,
            is_inline,
        }
    }
}
