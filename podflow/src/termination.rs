//! Parsing of auto-termination specifiers.

use crate::errors::{PodflowError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?$").expect("relative duration pattern is valid")
});

/// Parses a termination specifier relative to `now`.
///
/// Accepted forms: `30m`, `2h`, `1d`, `1d12h`, `2025-01-31` (midnight UTC),
/// `2025-01-31 18:00` (UTC) and RFC 3339. The result must lie in the future.
pub fn parse_termination_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PodflowError::validation("Empty termination time"));
    }

    let at = parse_relative(&input.to_lowercase())
        .map(|delta| now + delta)
        .or_else(|| parse_absolute(input))
        .ok_or_else(|| {
            PodflowError::validation(format!(
                "Invalid termination time '{input}'; use e.g. 30m, 2h, 1d12h, 2025-01-31 or 2025-01-31 18:00"
            ))
        })?;

    if at <= now {
        return Err(PodflowError::validation(format!(
            "Termination time {} is not in the future",
            at.format("%Y-%m-%d %H:%M UTC")
        )));
    }
    Ok(at)
}

fn parse_relative(input: &str) -> Option<Duration> {
    let caps = RELATIVE.captures(input)?;
    let part = |i: usize| -> Option<i64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    if (1..=3).all(|i| caps.get(i).is_none()) {
        return None;
    }
    let (days, hours, minutes) = (part(1)?, part(2)?, part(3)?);
    Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// `3h 20m` style countdown until `at`.
#[must_use]
pub fn format_countdown(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (at - now).num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    match (days, hours) {
        (0, 0) => format!("{mins}m"),
        (0, _) => format!("{hours}h {mins}m"),
        _ => format!("{days}d {hours}h"),
    }
}
