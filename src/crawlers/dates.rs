//! Publication date parsing for blog listings.
//!
//! Blogs print dates in many shapes; anything unrecognised yields `None`
//! and the post falls back to its ingestion time.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

static NUMERIC_DATE: OnceLock<Option<Regex>> = OnceLock::new();

/// Matches `2026-01-05`, `2026.01.05`, `2026/1/5` and `2026년 1월 5일`.
fn numeric_date() -> Option<&'static Regex> {
    NUMERIC_DATE
        .get_or_init(|| {
            Regex::new(r"(\d{4})\s*[-./년]\s*(\d{1,2})\s*[-./월]\s*(\d{1,2})").ok()
        })
        .as_ref()
}

/// Parse a publication date from free-form listing text.
pub fn parse_published(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(caps) = numeric_date().and_then(|re| re.captures(text)) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return midnight(NaiveDate::from_ymd_opt(year, month, day)?);
    }

    // "Jan 5, 2026" / "January 5, 2026"
    ["%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(midnight)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
