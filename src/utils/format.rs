//! Output formatting utilities

use chrono::{DateTime, Utc};

/// Truncate a string to a maximum length
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len < 3 {
        return "...".to_string();
    }
    let trimmed = s.chars().take(max_len - 3).collect::<String>();
    format!("{trimmed}...")
}

/// Short form of an optional timestamp
#[must_use]
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// First characters of a revision id
#[must_use]
pub fn short_revision(revision: Option<&str>) -> String {
    revision.map_or_else(|| "-".to_string(), |r| r.chars().take(12).collect())
}
