//! Common utility functions used across the codebase.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Truncates a string to at most `max_chars` characters, adding "..." if truncated.
///
/// UTF-8 safe: respects character boundaries, so multi-byte characters never
/// cause a panic.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    // Fast path: byte length <= max_chars implies char count <= max_chars.
    if s.len() <= max_chars {
        return s.to_string();
    }
    let char_count = s.chars().count();
    if char_count <= max_chars {
        return s.to_string();
    }

    let suffix = "...";
    let suffix_len = suffix.chars().count();
    if max_chars <= suffix_len {
        return suffix.chars().take(max_chars).collect();
    }
    let truncated: String = s.chars().take(max_chars - suffix_len).collect();
    format!("{}{}", truncated, suffix)
}

/// Parse a stored or client-supplied timestamp into UTC.
///
/// Accepts RFC 3339 (with `Z` or a numeric offset), a bare date
/// (`YYYY-MM-DD`, midnight UTC), or a naive `YYYY-MM-DD HH:MM:SS` treated as
/// UTC. Returns `None` for anything else; callers decide whether that is a
/// validation error or a row to skip.
pub fn parse_utc_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}
