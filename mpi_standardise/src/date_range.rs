//! Resolution of free-text year ranges, and the per-scope date envelopes.

use chrono::{Datelike, NaiveDate};
use log::debug;
use std::collections::BTreeMap;

use crate::config::*;

/// The scope that covers every country.
pub const GLOBAL_SCOPE: &str = "global";

// A date read from a table, with the precision it was written in.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum PartialDate {
    Year(i32),
    Month(i32, u32),
    Day(NaiveDate),
}

impl PartialDate {
    fn year(&self) -> i32 {
        match self {
            PartialDate::Year(y) => *y,
            PartialDate::Month(y, _) => *y,
            PartialDate::Day(d) => d.year(),
        }
    }

    fn first_day(&self) -> Option<NaiveDate> {
        match self {
            PartialDate::Year(y) => NaiveDate::from_ymd_opt(*y, 1, 1),
            PartialDate::Month(y, m) => NaiveDate::from_ymd_opt(*y, *m, 1),
            PartialDate::Day(d) => Some(*d),
        }
    }

    fn last_day(&self) -> Option<NaiveDate> {
        match self {
            PartialDate::Year(y) => NaiveDate::from_ymd_opt(*y, 12, 31),
            PartialDate::Month(y, 12) => NaiveDate::from_ymd_opt(*y, 12, 31),
            PartialDate::Month(y, m) => NaiveDate::from_ymd_opt(*y, m + 1, 1)?.pred_opt(),
            PartialDate::Day(d) => Some(*d),
        }
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

fn month_from_name(s: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = s.trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|idx| (idx + 1) as u32)
}

fn parse_part(s: &str) -> Option<PartialDate> {
    let s = s.trim();
    if is_digits(s, 4) {
        return s.parse::<i32>().ok().map(PartialDate::Year);
    }

    let pieces: Vec<&str> = s.split('/').map(str::trim).collect();
    match pieces.as_slice() {
        [m, y] if is_digits(y, 4) => {
            let month = m.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
            return Some(PartialDate::Month(y.parse::<i32>().ok()?, month));
        }
        [d, m, y] if is_digits(y, 4) => {
            let date = NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)?;
            return Some(PartialDate::Day(date));
        }
        _ => {}
    }

    // Written months, such as "Oct 2015" or "October 2015"
    let words: Vec<&str> = s.split_whitespace().collect();
    if let [m, y] = words.as_slice() {
        if is_digits(y, 4) {
            return Some(PartialDate::Month(y.parse().ok()?, month_from_name(m)?));
        }
    }
    None
}

// "2015-17": the second year only carries its last two digits.
fn parse_short_year(s: &str, start_year: i32) -> Option<PartialDate> {
    let s = s.trim();
    if !is_digits(s, 2) {
        return None;
    }
    let yy: i32 = s.parse().ok()?;
    let mut year = start_year - start_year.rem_euclid(100) + yy;
    if year < start_year {
        year += 100;
    }
    Some(PartialDate::Year(year))
}

/// Parses a year or a year range into a pair of instants.
///
/// For a range such as `2015-2016`, the start is the beginning of the first part
/// and the end is the end of the second part. The two parts may have different
/// precisions. A single value such as `2020` gives both endpoints.
///
/// When `max_end` is set, the end is the last second of the final day
/// (`2020-12-31T23:59:59`), otherwise it is midnight of the final day.
pub fn parse_date_range(text: &str, max_end: bool) -> Result<DateRange, StandardiseError> {
    let parse_err = || StandardiseError::DateRangeParse {
        text: text.to_string(),
    };
    let cleaned = text.trim().replace('\u{2013}', "-").replace('\u{2014}', "-");
    let parts: Vec<&str> = cleaned.split('-').map(str::trim).collect();
    let (first, last) = match parts.as_slice() {
        [single] => {
            let d = parse_part(single).ok_or_else(parse_err)?;
            (d, d)
        }
        [start, end] => {
            let s = parse_part(start).ok_or_else(parse_err)?;
            let e = parse_part(end)
                .or_else(|| parse_short_year(end, s.year()))
                .ok_or_else(parse_err)?;
            (s, e)
        }
        _ => {
            // Only full ISO dates have more than one hyphen.
            let d = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d").map_err(|_| parse_err())?;
            (PartialDate::Day(d), PartialDate::Day(d))
        }
    };

    let start = first
        .first_day()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(parse_err)?;
    let last_day = last.last_day().ok_or_else(parse_err)?;
    let end = if max_end {
        last_day.and_hms_opt(23, 59, 59)
    } else {
        last_day.and_hms_opt(0, 0, 0)
    }
    .ok_or_else(parse_err)?;

    if start > end {
        return Err(StandardiseError::InvertedDateRange {
            text: text.to_string(),
        });
    }
    debug!("parse_date_range: {:?} -> {} {}", text, start, end);
    Ok(DateRange { start, end })
}

/// Widens an envelope so that it covers `next`.
pub fn extend_envelope(current: Option<DateRange>, next: DateRange) -> DateRange {
    match current {
        None => next,
        Some(cur) => DateRange {
            start: cur.start.min(next.start),
            end: cur.end.max(next.end),
        },
    }
}

/// The smallest date range covering all the rows seen, for each country and
/// for the global scope.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DateRangeEnvelopes {
    scopes: BTreeMap<String, DateRange>,
}

impl DateRangeEnvelopes {
    pub fn new() -> DateRangeEnvelopes {
        DateRangeEnvelopes {
            scopes: BTreeMap::new(),
        }
    }

    /// Records a range for a country, and for the global scope.
    pub fn record(&mut self, country_code: &str, range: DateRange) {
        for scope in [country_code, GLOBAL_SCOPE] {
            let next = extend_envelope(self.scopes.get(scope).copied(), range);
            self.scopes.insert(scope.to_string(), next);
        }
    }

    pub fn get(&self, scope: &str) -> Option<&DateRange> {
        self.scopes.get(scope)
    }

    pub fn global(&self) -> Option<&DateRange> {
        self.get(GLOBAL_SCOPE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DateRange)> {
        self.scopes.iter()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
