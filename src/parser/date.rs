//! `Date:` header parsing, tolerant of the variants real mailers emit.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Formats tried after RFC 2822 / RFC 3339, with the day-of-week removed.
const FALLBACK_FORMATS: [&str; 8] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Timezone abbreviations seen at the end of broken dates.
const NAMED_ZONES: [(&str, &str); 12] = [
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("CEST", "+0200"),
    ("CET", "+0100"),
];

/// Parse an email date string into UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Drop a trailing "(UTC)"-style comment and any leading "Thu, "
    let core = trimmed
        .split_once(" (")
        .map_or(trimmed, |(head, _)| head)
        .trim();
    let core = strip_day_of_week(core);

    for candidate in [core.to_string(), replace_named_zone(core)] {
        if let Some(dt) = parse_with_formats(&candidate) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    FALLBACK_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|ndt| Utc.from_utc_datetime(&ndt))
            })
    })
}

/// Last resort: let `mail-parser` try its own lenient grammar.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    let wrapped = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(wrapped.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn strip_day_of_week(s: &str) -> &str {
    match s.split_once([',', ' ']) {
        Some((head, rest))
            if head.len() == 3 && head.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            rest.trim_start_matches([',', ' '])
        }
        _ => s,
    }
}

fn replace_named_zone(s: &str) -> String {
    NAMED_ZONES
        .iter()
        .find_map(|(name, offset)| {
            s.strip_suffix(name)
                .map(|head| format!("{}{offset}", head))
        })
        .unwrap_or_else(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-04 10:00");
    }

    #[test]
    fn test_parse_date_named_zone() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_with_comment() {
        assert!(parse_date("Thu, 4 Jan 2024 10:00:00 +0000 (UTC)").is_some());
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_strip_day_of_week() {
        assert_eq!(strip_day_of_week("Mon, 01 Jan"), "01 Jan");
        assert_eq!(strip_day_of_week("01 Jan"), "01 Jan");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date at all").is_none());
    }
}
