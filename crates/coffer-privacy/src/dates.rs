//! Calendar helpers for time-bucketing
//!
//! Ledger dates are stored as strings and arrive in whatever shape the
//! importer produced (`2024-03-15`, `2024/3/5`, sometimes with a trailing
//! timestamp). Parsing here is deliberately forgiving: a `YYYY-M-D` prefix
//! is enough, anything unparseable falls back to today rather than
//! erroring, so one malformed record cannot take down a whole report.

use chrono::{Datelike, Local, NaiveDate};

/// Parse a local calendar date from a `YYYY-M-D` or `YYYY/M/D` prefix.
///
/// Trailing text after the day (e.g. `T09:00:00Z`) is ignored. Returns
/// `None` when the prefix is missing or the components do not form a real
/// date (`2024-13-01`, `2024-02-30`).
pub fn parse_local_date(input: &str) -> Option<NaiveDate> {
    let (year, rest) = split_digits(input, 4, 4)?;
    let rest = strip_separator(rest)?;
    let (month, rest) = split_digits(rest, 1, 2)?;
    let rest = strip_separator(rest)?;
    let (day, _) = split_digits(rest, 1, 2)?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// The `YYYY-MM` period a date string belongs to; unparseable dates land
/// in the current period.
pub fn date_to_period(date: &str) -> String {
    period_of(parse_local_date(date).unwrap_or_else(today))
}

/// Format a date's `YYYY-MM` period.
pub fn period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Week-of-month bucket, 1 through 5: `ceil(day / 7)`.
pub fn week_of_month(date: &str) -> u32 {
    let parsed = parse_local_date(date).unwrap_or_else(today);
    parsed.day().div_ceil(7)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Take `min..=max` leading ASCII digits as a number, returning the rest.
fn split_digits(s: &str, min: usize, max: usize) -> Option<(u32, &str)> {
    let len = s
        .bytes()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len < min {
        return None;
    }
    let value = s[..len].parse().ok()?;
    Some((value, &s[len..]))
}

fn strip_separator(s: &str) -> Option<&str> {
    s.strip_prefix('-').or_else(|| s.strip_prefix('/'))
}
