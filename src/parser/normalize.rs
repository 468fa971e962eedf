//! Byte normalization: transport cleanup of the whole payload and RFC 2047
//! encoded-word decoding of header text.
//!
//! Both passes are pure functions over their input. Every look-ahead is
//! bounds-checked, so a `=` at the very end of a buffer is just a byte.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

/// A lone `=XX` escape followed by a hex run at least this long is taken to
/// be data (a URL parameter, a colour, an id) rather than quoted-printable.
const MAX_LONE_ESCAPE_RUN: usize = 6;

/// Upper bound on encoded-word passes; a pass only repeats when the previous
/// one decoded something, so this only trips on deliberately nested input.
const MAX_ENCODED_WORD_PASSES: usize = 8;

/// Transport normalization of a raw payload.
///
/// - `CRLF` collapses to `LF`.
/// - `=XX` (two upper-case hex digits) becomes the byte it encodes.
/// - `=` followed by a line break is a soft break: both are removed.
///
/// Escape decoding takes precedence over soft-break handling. A `=`
/// preceded by `?` or `=` is never a soft break, which keeps encoded-word
/// terminators and base64 `==` padding intact, and a soft break right
/// before a line starting with `--` is kept so boundary lines survive
/// single-`=` base64 padding. A lone escape followed by a long hex run is
/// left alone; escapes chained directly after another escape always decode.
/// Complete encoded words are copied untouched; header decoding owns their escapes.
pub fn normalize_transport(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    let mut in_escape_chain = false;

    while i < input.len() {
        match input[i] {
            b'\r' if input.get(i + 1) == Some(&b'\n') => {
                i += 1;
            }
            b'=' => {
                if let Some(len) = encoded_word_len(input, i) {
                    out.extend_from_slice(&input[i..i + len]);
                    i += len;
                    in_escape_chain = false;
                    continue;
                }
                if let Some(byte) = hex_pair(input, i + 1) {
                    if in_escape_chain || hex_run(input, i + 1) < MAX_LONE_ESCAPE_RUN {
                        out.push(byte);
                        i += 3;
                        in_escape_chain = true;
                        continue;
                    }
                }
                if let Some(break_len) = line_break_len(input, i + 1) {
                    if is_soft_break(input, i, break_len) {
                        i += 1 + break_len;
                        continue;
                    }
                }
                out.push(b'=');
                i += 1;
                in_escape_chain = false;
            }
            b => {
                out.push(b);
                i += 1;
                in_escape_chain = false;
            }
        }
    }

    out
}

/// Length of the RFC 2047 encoded word (`=?charset?X?payload?=`) starting
/// at `at`. Its escapes belong to the word, not to the transport.
fn encoded_word_len(input: &[u8], at: usize) -> Option<usize> {
    let rest = input.get(at..)?.strip_prefix(b"=?")?;
    let is_space = |b: &u8| b.is_ascii_whitespace();

    let charset_len = rest.iter().position(|&b| b == b'?')?;
    if charset_len == 0 || rest[..charset_len].iter().any(is_space) {
        return None;
    }
    let rest = &rest[charset_len + 1..];
    if !matches!(rest, [b'Q' | b'q' | b'B' | b'b', b'?', ..]) {
        return None;
    }
    let payload = &rest[2..];

    let end = payload.windows(2).position(|w| w == b"?=")?;
    if payload[..end].iter().any(is_space) {
        return None;
    }
    Some(2 + charset_len + 1 + 2 + end + 2)
}

/// Value of the two upper-case hex digits at `at`, if both are present.
fn hex_pair(input: &[u8], at: usize) -> Option<u8> {
    let hi = qp_hex_value(*input.get(at)?)?;
    let lo = qp_hex_value(*input.get(at + 1)?)?;
    Some(hi << 4 | lo)
}

fn qp_hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Length of the run of hex digits starting at `at`, capped at the
/// threshold that matters.
fn hex_run(input: &[u8], at: usize) -> usize {
    input
        .iter()
        .skip(at)
        .take(MAX_LONE_ESCAPE_RUN)
        .take_while(|b| b.is_ascii_hexdigit())
        .count()
}

/// Length of the line break at `at` (`\n` or `\r\n`).
fn line_break_len(input: &[u8], at: usize) -> Option<usize> {
    match (input.get(at), input.get(at + 1)) {
        (Some(b'\n'), _) => Some(1),
        (Some(b'\r'), Some(b'\n')) => Some(2),
        _ => None,
    }
}

/// Whether the `=` at `at`, followed by a break of `break_len` bytes, is a
/// quoted-printable soft line break.
fn is_soft_break(input: &[u8], at: usize, break_len: usize) -> bool {
    if at > 0 && matches!(input[at - 1], b'?' | b'=') {
        return false;
    }
    let next_line = at + 1 + break_len;
    !input
        .get(next_line..)
        .is_some_and(|rest| rest.starts_with(b"--"))
}

/// Decode RFC 2047 encoded words in header text.
///
/// Example: `"=?utf-8?Q?Caf=C3=A9_au_lait?="` → `"Café au lait"`
///
/// Passes repeat until nothing more decodes, so the result holds no
/// decodable `=?…?=` span. Whitespace between two adjacent encoded words is
/// dropped (RFC 2047 §6.2). Unterminated or unsupported words are kept
/// literally. The result is trimmed.
pub fn decode_encoded_words(input: &str) -> String {
    let mut text = input.to_string();
    for _ in 0..MAX_ENCODED_WORD_PASSES {
        match decode_pass(&text) {
            Some(decoded) => text = decoded,
            None => break,
        }
    }
    text.trim().to_string()
}

/// One left-to-right pass. `None` when no word was decoded.
fn decode_pass(input: &str) -> Option<String> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;
    let mut changed = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let candidate = &remaining[start..];

        match EncodedWord::parse(candidate) {
            Some(word) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    result.push_str(before);
                }
                result.push_str(&word.text);
                remaining = &candidate[word.consumed..];
                last_was_encoded = true;
                changed = true;
            }
            None => {
                result.push_str(before);
                result.push_str("=?");
                remaining = &candidate[2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    changed.then_some(result)
}

struct EncodedWord {
    text: String,
    consumed: usize, // bytes of the whole `=?charset?enc?payload?=` span
}

impl EncodedWord {
    /// Parse one encoded word at the start of `s` (which begins with `=?`).
    fn parse(s: &str) -> Option<Self> {
        let inner = s.strip_prefix("=?")?;

        let first_q = inner.find('?')?;
        let charset = &inner[..first_q];

        let rest = &inner[first_q + 1..];
        let second_q = rest.find('?')?;
        let encoding = &rest[..second_q];

        let rest2 = &rest[second_q + 1..];
        let end = rest2.find("?=")?;
        let payload = &rest2[..end];

        // Encoded words never contain whitespace; a "?=" further along
        // belongs to some other token.
        if charset.is_empty() || payload.contains(char::is_whitespace) {
            return None;
        }
        if !is_supported_charset(charset) {
            return None;
        }

        let bytes = match encoding {
            "Q" | "q" => decode_q(payload),
            "B" | "b" => STANDARD
                .decode(payload)
                .or_else(|_| STANDARD_NO_PAD.decode(payload.trim_end_matches('=')))
                .ok()?,
            _ => return None,
        };

        Some(Self {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            consumed: 2 + first_q + 1 + second_q + 1 + end + 2,
        })
    }
}

/// UTF-8 and its ASCII subset only. An RFC 2231 language tag
/// (`utf-8*en`) is ignored.
fn is_supported_charset(charset: &str) -> bool {
    let name = charset.split('*').next().unwrap_or(charset);
    ["utf-8", "utf8", "us-ascii", "ascii"]
        .iter()
        .any(|c| name.eq_ignore_ascii_case(c))
}

/// Q-encoding (RFC 2047 §4.2): `_` is a space, `=XX` is a byte.
fn decode_q(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => match (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                (Some(hi), Some(lo)) => {
                    result.push((hi * 16 + lo) as u8);
                    i += 3;
                }
                _ => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}
