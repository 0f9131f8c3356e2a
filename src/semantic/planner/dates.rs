//! Date parsing for date filters.
//!
//! Inputs are tried against strict formats first (`2024-01-31`,
//! `2024-01-31T10:00:00`, RFC 3339, `2024-01`), then against a small
//! relative-phrase grammar evaluated against the compile's reference time
//! (`today`, `last week`, `3 days ago`, `last 7 days`, `from X to Y`, ...).
//! Anything else is `UnparseableDate`.
//!
//! Every input resolves to an inclusive [`DateRange`]. A calendar day covers
//! `00:00:00.000` to `23:59:59.999`; an instant is a range of one point.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::semantic::error::{SemanticError, SemanticResult};

/// Format used for bound date values.
pub const BINDING_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

static AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(day|week|month|year)s?\s+(ago|from now)$").unwrap()
});

static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(last|this|next)\s+(day|week|month|quarter|year)$").unwrap()
});

static LAST_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^last\s+(\d+)\s+(day|week|month|year)s?$").unwrap()
});

static FROM_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^from\s+(.+?)\s+to\s+(.+)$").unwrap());

/// Inclusive datetime range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn instant(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }

    /// Whole days `first..=last`; `None` past the end of the calendar.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        let end = last
            .and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::days(1))?
            .checked_sub_signed(Duration::milliseconds(1))?;
        Some(Self {
            start: first.and_time(NaiveTime::MIN),
            end,
        })
    }

    pub fn day(day: NaiveDate) -> Option<Self> {
        Self::days(day, day)
    }

    pub fn start_binding(&self) -> String {
        self.start.format(BINDING_FORMAT).to_string()
    }

    pub fn end_binding(&self) -> String {
        self.end.format(BINDING_FORMAT).to_string()
    }
}

/// Parse a single date expression.
pub fn parse_date(input: &str, reference: NaiveDateTime) -> SemanticResult<DateRange> {
    let trimmed = input.trim();
    parse_strict(trimmed)
        .or_else(|| parse_relative(&trimmed.to_lowercase(), reference))
        .ok_or_else(|| SemanticError::UnparseableDate(input.to_string()))
}

/// Parse an explicit `[start, end]` pair; the range covers both ends.
pub fn parse_bounds(start: &str, end: &str, reference: NaiveDateTime) -> SemanticResult<DateRange> {
    let first = parse_date(start, reference)?;
    let last = parse_date(end, reference)?;
    Ok(DateRange {
        start: first.start,
        end: last.end,
    })
}

fn parse_strict(input: &str) -> Option<DateRange> {
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return DateRange::day(day);
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(at) = NaiveDateTime::parse_from_str(input, format) {
            return Some(DateRange::instant(at));
        }
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(DateRange::instant(at.naive_utc()));
    }

    // Year-month: the whole month.
    if let Ok(first) = NaiveDate::parse_from_str(&format!("{}-01", input), "%Y-%m-%d") {
        return month_range(first, 1);
    }

    None
}

fn parse_relative(input: &str, reference: NaiveDateTime) -> Option<DateRange> {
    let today = reference.date();

    match input {
        "now" => return Some(DateRange::instant(reference)),
        "today" => return DateRange::day(today),
        "yesterday" => return today.pred_opt().and_then(DateRange::day),
        "tomorrow" => return today.succ_opt().and_then(DateRange::day),
        _ => {}
    }

    if let Some(caps) = AGO.captures(input) {
        let n: u32 = caps[1].parse().ok()?;
        let sign = if &caps[3] == "ago" { -1 } else { 1 };
        return shift(today, &caps[2], sign * n as i64).and_then(DateRange::day);
    }

    if let Some(caps) = PERIOD.captures(input) {
        let offset = match &caps[1] {
            "last" => -1,
            "next" => 1,
            _ => 0,
        };
        return period(today, &caps[2], offset);
    }

    if let Some(caps) = LAST_N.captures(input) {
        let n: u32 = caps[1].parse().ok()?;
        if n == 0 {
            return None;
        }
        // The n-unit window ending today.
        let first = shift(today, &caps[2], -(n as i64))?.succ_opt()?;
        return DateRange::days(first, today);
    }

    if let Some(caps) = FROM_TO.captures(input) {
        let first = parse_strict(&caps[1]).or_else(|| parse_relative(&caps[1], reference))?;
        let last = parse_strict(&caps[2]).or_else(|| parse_relative(&caps[2], reference))?;
        return Some(DateRange {
            start: first.start,
            end: last.end,
        });
    }

    None
}

/// `day` moved by `n` units.
fn shift(day: NaiveDate, unit: &str, n: i64) -> Option<NaiveDate> {
    let months = |count: i64| -> Option<NaiveDate> {
        let m = Months::new(u32::try_from(count.unsigned_abs()).ok()?);
        if count < 0 {
            day.checked_sub_months(m)
        } else {
            day.checked_add_months(m)
        }
    };
    match unit {
        "day" => day.checked_add_signed(Duration::days(n)),
        "week" => day.checked_add_signed(Duration::weeks(n)),
        "month" => months(n),
        "quarter" => months(n * 3),
        "year" => months(n * 12),
        _ => None,
    }
}

/// The calendar period containing `day`, moved by `offset` periods.
fn period(day: NaiveDate, unit: &str, offset: i64) -> Option<DateRange> {
    match unit {
        "day" => shift(day, "day", offset).and_then(DateRange::day),
        "week" => {
            let monday = day
                .checked_sub_signed(Duration::days(day.weekday().num_days_from_monday() as i64))?;
            let first = shift(monday, "week", offset)?;
            DateRange::days(first, first.checked_add_signed(Duration::days(6))?)
        }
        "month" => {
            let first = shift(day.with_day(1)?, "month", offset)?;
            month_range(first, 1)
        }
        "quarter" => {
            let quarter_month = (day.month0() / 3) * 3 + 1;
            let first = NaiveDate::from_ymd_opt(day.year(), quarter_month, 1)?;
            month_range(shift(first, "quarter", offset)?, 3)
        }
        "year" => {
            let first = NaiveDate::from_ymd_opt(day.year(), 1, 1)?;
            month_range(shift(first, "year", offset)?, 12)
        }
        _ => None,
    }
}

/// `months` whole months starting at `first`.
fn month_range(first: NaiveDate, months: u32) -> Option<DateRange> {
    let next = first.checked_add_months(Months::new(months))?;
    DateRange::days(first, next.pred_opt()?)
}
