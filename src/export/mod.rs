//! Writing decoded parts to disk.

pub mod attachment;

/// Replace every character that is unsafe in a file name with `_` and cap
/// the length. Never returns an empty string.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}
