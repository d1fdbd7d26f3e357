use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ScrapeError};

const DATE_FORMATS: &[&str] = &["%d.%m.%y", "%d.%m.%Y", "%Y-%m-%d"];

static DATE_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2,4}[/.,-]\d{2}[/.,-]\d{2,4}").expect("valid date regex")
});

static ONLINE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)online:\s*(.*)$").expect("valid online prefix regex"));

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(minute|stunde|tag)").expect("valid relative time regex")
});

/// Parse an absolute date. Of a range like `01.03.2021 / 15.03.2021` only the
/// first half counts.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let first = text.split('/').next().unwrap_or(text).trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(first, format).ok())
        .ok_or_else(|| ScrapeError::parse("date", text))
}

/// Move-in date from a "Bezugsfrei ab" value.
///
/// `sofort` is today; a negotiable date ("nach Vereinbarung") or a value
/// without any date is unknown.
pub fn parse_move_in(text: &str, today: NaiveDate) -> Result<Option<NaiveDate>> {
    let lower = text.to_lowercase();
    if lower.contains("sofort") {
        return Ok(Some(today));
    }
    match DATE_IN_TEXT.find(text) {
        Some(m) => parse_date(m.as_str()).map(Some),
        None => Ok(None),
    }
}

/// Resolve "online since" text: `"5 Minuten"`, `"3 Stunden"`, `"2 Tage"` are
/// relative to `now`, anything else must be a `%d.%m.%Y` date.
pub fn parse_online_since(text: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let text = match ONLINE_PREFIX.captures(text.trim()) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().to_string(),
    };

    if let Some(caps) = RELATIVE.captures(&text) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| ScrapeError::parse("online time", text.as_str()))?;
        let offset = match caps[2].to_lowercase().as_str() {
            "minute" => Duration::try_minutes(amount),
            "stunde" => Duration::try_hours(amount),
            _ => Duration::try_days(amount),
        };
        return offset
            .and_then(|offset| now.checked_sub_signed(offset))
            .ok_or_else(|| ScrapeError::parse("online time", text));
    }

    NaiveDate::parse_from_str(&text, "%d.%m.%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ScrapeError::parse("online time", text))
}
