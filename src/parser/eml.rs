//! Loading single messages (`.eml` files, or an mbox holding one message)
//! from disk or from an in-memory payload.

use std::path::Path;

use tracing::debug;

use crate::config::DecoderConfig;
use crate::error::{MimeError, Result};
use crate::model::message::Message;

/// Read and decode the message stored at `path`.
pub fn read_message(path: impl AsRef<Path>, config: &DecoderConfig) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MimeError::FileNotFound(path.to_path_buf())
        } else {
            MimeError::io(path, e)
        }
    })?;

    debug!(path = %path.display(), bytes = data.len(), "Read message file");
    decode_payload(&data, config)
}

/// Decode a fully buffered payload after applying the configured limits
/// and stripping file framing (BOM, mbox `From ` line).
pub fn decode_payload(data: &[u8], config: &DecoderConfig) -> Result<Message> {
    if data.len() > config.max_message_size {
        return Err(MimeError::MessageTooLarge {
            size: data.len(),
            limit: config.max_message_size,
        });
    }

    let mut bytes = strip_bom(data);
    if config.strip_mbox_from_line {
        bytes = skip_from_line(bytes);
    }
    Message::parse_with_depth(bytes, config.max_depth)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&b"\xEF\xBB\xBF"[..]).unwrap_or(data)
}

/// Skip the `From ` separator line at the start of an mbox message.
fn skip_from_line(data: &[u8]) -> &[u8] {
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFSubject: x"), b"Subject: x");
        assert_eq!(strip_bom(b"Subject: x"), b"Subject: x");
    }

    #[test]
    fn test_decode_payload_strips_framing() {
        let msg = decode_payload(
            b"\xEF\xBB\xBFFrom a@b Thu Jan 01 00:00:00 2024\nSubject: Framed\n\nBody",
            &DecoderConfig::default(),
        )
        .unwrap();
        assert_eq!(msg.subject(), Some("Framed"));
    }

    #[test]
    fn test_decode_payload_keeps_from_line_when_disabled() {
        let config = DecoderConfig {
            strip_mbox_from_line: false,
            ..DecoderConfig::default()
        };
        let msg = decode_payload(b"From a@b Thu\nSubject: Kept\n\nBody", &config).unwrap();
        assert_eq!(msg.root().headers().len(), 2);
    }

    #[test]
    fn test_decode_payload_rejects_oversized() {
        let config = DecoderConfig {
            max_message_size: 8,
            ..DecoderConfig::default()
        };
        let err = decode_payload(b"Subject: too long\n\nBody", &config).unwrap_err();
        assert!(matches!(err, MimeError::MessageTooLarge { limit: 8, .. }));
    }
}
