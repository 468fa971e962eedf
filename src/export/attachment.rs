//! Extract attachments and inline parts from a decoded message.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::sanitize_filename_part;
use crate::error::{MimeError, Result};
use crate::model::message::Message;
use crate::parser::part::Part;

/// Write the decoded content of `part` into `output_dir` as `filename`
/// (sanitized, never overwriting an existing file).
pub fn export_part(
    part: &Part,
    filename: &str,
    output_dir: &Path,
    max_filename_len: usize,
) -> Result<PathBuf> {
    let name = sanitize_filename_part(filename, max_filename_len);
    let path = unique_path(&output_dir.join(name));
    std::fs::write(&path, part.content()).map_err(|e| MimeError::io(&path, e))?;
    info!(path = %path.display(), "Exported part");
    Ok(path)
}

/// Extract every attachment and inline file of `message` into `output_dir`.
///
/// Parts that fail to write are logged and skipped; the paths of the
/// written files are returned in tree order.
pub fn export_all_attachments(
    message: &Message,
    output_dir: &Path,
    max_filename_len: usize,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| MimeError::io(output_dir, e))?;

    let parts = message.root().iter().filter(|p| p.is_attachment());
    let mut paths = Vec::new();

    for (meta, part) in message.attachments().into_iter().zip(parts) {
        match export_part(part, &meta.filename, output_dir, max_filename_len) {
            Ok(path) => paths.push(path),
            Err(e) => {
                warn!(
                    filename = %meta.filename,
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }

    Ok(paths)
}

/// Write the decoded content of the part with `content_id` to `output`.
pub fn export_content_id(message: &Message, content_id: &str, output: &Path) -> Result<PathBuf> {
    let part = message
        .part_with_content_id(content_id)
        .ok_or_else(|| MimeError::PartNotFound(content_id.to_string()))?;

    if output.is_dir() {
        return Err(MimeError::ExportError(format!(
            "'{}' is a directory, expected a file path",
            output.display()
        )));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MimeError::io(parent, e))?;
    }

    std::fs::write(output, part.content()).map_err(|e| MimeError::io(output, e))?;
    Ok(output.to_path_buf())
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"Content-Type: multipart/mixed; boundary=m\n\n\
        --m\nContent-Type: text/plain\n\nbody\n\
        --m\nContent-Type: text/csv; name=\"data.csv\"\n\na,b\n1,2\n\
        --m\nContent-Type: image/png\nContent-ID: <pic@x>\nContent-Transfer-Encoding: base64\n\naGVsbG8=\n\
        --m--";

    #[test]
    fn test_export_all_attachments() {
        let tmp = tempfile::tempdir().unwrap();
        let msg = Message::parse(MESSAGE).unwrap();

        let paths = export_all_attachments(&msg, tmp.path(), 150).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].file_name().unwrap(), "data.csv");
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"a,b\n1,2");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"hello");
    }

    #[test]
    fn test_export_does_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let msg = Message::parse(MESSAGE).unwrap();

        export_all_attachments(&msg, tmp.path(), 150).unwrap();
        let second = export_all_attachments(&msg, tmp.path(), 150).unwrap();
        assert_eq!(second[0].file_name().unwrap(), "data_1.csv");
    }

    #[test]
    fn test_export_content_id() {
        let tmp = tempfile::tempdir().unwrap();
        let msg = Message::parse(MESSAGE).unwrap();
        let out = tmp.path().join("nested").join("pic.png");

        export_content_id(&msg, "<pic@x>", &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"hello");

        let err = export_content_id(&msg, "missing@x", &out).unwrap_err();
        assert!(matches!(err, MimeError::PartNotFound(_)));

        let err = export_content_id(&msg, "pic@x", tmp.path()).unwrap_err();
        assert!(matches!(err, MimeError::ExportError(_)));
    }
}
