// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting windows over calendar days.
//!
//! A [`ReportWindow`] is a pair of inclusive calendar days tested as a
//! half-open timestamp interval: `field >= startOfDay(start)` and
//! `field < startOfDay(end + 1 day)`. Testing against the next midnight
//! instead of `<= endOfDay(end)` is deliberate: the inclusive variant is
//! sensitive to sub-second formatting and timezone rounding and silently
//! excluded valid boundary records.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// An inclusive calendar-day range evaluated with half-open timestamp bounds.
///
/// `start > end` is an input contract violation the caller must avoid; such a
/// window is naturally empty (its bounds cross) and is never silently swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    /// Creates a window covering `start..=end` at calendar-day granularity.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A window covering exactly one day.
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Inclusive lower bound: midnight at the start day.
    pub fn start_bound(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Exclusive upper bound: midnight of the day after the end day.
    ///
    /// Saturates at the calendar maximum rather than overflowing.
    pub fn end_bound(&self) -> NaiveDateTime {
        self.end
            .succ_opt()
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN)
    }

    /// Half-open membership test: `start_bound <= ts < end_bound`.
    ///
    /// Operates on naive timestamps in the CRM's local time, so the result
    /// does not depend on the process timezone.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_bound() && ts < self.end_bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn last_instant_of_end_day_is_included() {
        let window = ReportWindow::single_day(date(2025, 9, 8));
        assert!(window.contains(ts(2025, 9, 8, 23, 59, 59)));
    }

    #[test]
    fn next_midnight_is_excluded() {
        let window = ReportWindow::single_day(date(2025, 9, 8));
        assert!(!window.contains(ts(2025, 9, 9, 0, 0, 0)));
    }

    #[test]
    fn start_midnight_is_included() {
        let window = ReportWindow::new(date(2025, 9, 1), date(2025, 9, 8));
        assert!(window.contains(ts(2025, 9, 1, 0, 0, 0)));
    }

    #[test]
    fn instant_before_start_is_excluded() {
        let window = ReportWindow::new(date(2025, 9, 1), date(2025, 9, 8));
        assert!(!window.contains(ts(2025, 8, 31, 23, 59, 59)));
    }

    #[test]
    fn crossed_bounds_are_empty_not_swapped() {
        let window = ReportWindow::new(date(2025, 9, 8), date(2025, 9, 1));
        assert!(!window.contains(ts(2025, 9, 1, 12, 0, 0)));
        assert!(!window.contains(ts(2025, 9, 8, 12, 0, 0)));
        assert!(!window.contains(ts(2025, 9, 4, 12, 0, 0)));
        assert!(window.start_bound() >= window.end_bound());
    }

    #[test]
    fn bounds_span_the_window() {
        let window = ReportWindow::new(date(2025, 9, 1), date(2025, 9, 8));
        assert_eq!(window.start_bound(), ts(2025, 9, 1, 0, 0, 0));
        assert_eq!(window.end_bound(), ts(2025, 9, 9, 0, 0, 0));
    }
}
