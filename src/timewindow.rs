//! Resolves selected years into concrete date intervals, and maps dates
//! onto the accounting calendar used by the cumulative view.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a selected year means a calendar year (Jan-Dec) or a fiscal
/// year (Jul of that year through Jun of the next).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearMode {
    Calendar,
    Fiscal,
}

/// An inclusive date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn contains(&self, moment: NaiveDateTime) -> bool {
        moment >= self.start && moment <= self.end
    }
}

fn window_for_year(year: i32, mode: YearMode) -> DateWindow {
    let (start, end) = match mode {
        YearMode::Calendar => (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ),
        YearMode::Fiscal => (
            NaiveDate::from_ymd_opt(year, 7, 1),
            NaiveDate::from_ymd_opt(year + 1, 6, 30),
        ),
    };
    DateWindow {
        start: start
            .expect("month/day constants are valid")
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid"),
        end: end
            .expect("month/day constants are valid")
            .and_hms_opt(23, 59, 59)
            .expect("end-of-day is valid"),
    }
}

/// Converts the selected years into date windows.
///
/// An empty selection yields an empty list, which callers must interpret
/// as "no date restriction" — not "exclude everything". A record matches
/// a non-empty selection when its date falls in ANY window.
pub fn resolve_windows(years: &BTreeSet<i32>, mode: YearMode) -> Vec<DateWindow> {
    years.iter().map(|&y| window_for_year(y, mode)).collect()
}

/// The accounting year a date belongs to. Under the fiscal convention,
/// July onward belongs to the calendar year, January through June to the
/// previous one.
pub fn accounting_year(date: NaiveDate, mode: YearMode) -> i32 {
    match mode {
        YearMode::Calendar => date.year(),
        YearMode::Fiscal => {
            if date.month() >= 7 {
                date.year()
            } else {
                date.year() - 1
            }
        }
    }
}

/// 1-based month position within the accounting year: fiscal July=1 ...
/// June=12; calendar Jan=1 ... Dec=12.
pub fn accounting_month_index(month: u32, mode: YearMode) -> u32 {
    match mode {
        YearMode::Calendar => month,
        YearMode::Fiscal => {
            if month >= 7 {
                month - 6
            } else {
                month + 6
            }
        }
    }
}
