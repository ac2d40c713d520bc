//! View Window Calculator.
//!
//! Turns a reference date plus a view mode into the ordered list of calendar
//! days a client renders, and resolves prev/next/today navigation. Pure date
//! math — no store access, no ownership concerns.

use crate::task::{parse_day, TaskError};
use chrono::{Datelike, Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nav {
    Prev,
    Next,
    Today,
}

/// The calendar days a view displays, ascending.
///
/// Day: just the reference. Week: the Sunday-starting week containing the
/// reference. Month: every day of the reference's month.
pub fn view_window(reference: NaiveDate, mode: ViewMode) -> Vec<NaiveDate> {
    match mode {
        ViewMode::Day => vec![reference],
        ViewMode::Week => {
            let sunday = reference - Days::new(reference.weekday().num_days_from_sunday() as u64);
            (0..7).map(|offset| sunday + Days::new(offset)).collect()
        }
        ViewMode::Month => {
            let first = reference.with_day(1).unwrap();
            first
                .iter_days()
                .take_while(|day| day.month() == reference.month())
                .collect()
        }
    }
}

/// Shift the reference date one view-step back or forward, or reset it to
/// today (local calendar date). Month steps clamp to the last valid day of
/// the target month, so Jan 31 → Feb 29 rather than overflowing into March.
pub fn navigate(reference: NaiveDate, mode: ViewMode, nav: Nav) -> NaiveDate {
    match nav {
        Nav::Today => Local::now().date_naive(),
        Nav::Prev => match mode {
            ViewMode::Day => reference - Days::new(1),
            ViewMode::Week => reference - Days::new(7),
            ViewMode::Month => reference - Months::new(1),
        },
        Nav::Next => match mode {
            ViewMode::Day => reference + Days::new(1),
            ViewMode::Week => reference + Days::new(7),
            ViewMode::Month => reference + Months::new(1),
        },
    }
}

/// Parse and validate a date-range query. Both bounds are required, must be
/// valid dates, and the range must not be inverted.
pub fn parse_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(NaiveDate, NaiveDate), TaskError> {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(TaskError::Validation(
                "Start and end dates are required".into(),
            ))
        }
    };

    let start = parse_day(start)?;
    let end = parse_day(end)?;

    if end < start {
        return Err(TaskError::Validation(
            "End date must be after start date".into(),
        ));
    }

    Ok((start, end))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_view_is_just_the_reference() {
        assert_eq!(view_window(d(2024, 3, 6), ViewMode::Day), vec![d(2024, 3, 6)]);
    }

    #[test]
    fn week_view_starts_on_sunday() {
        // 2024-03-06 is a Wednesday; its week runs Sun 03-03 .. Sat 03-09.
        let window = view_window(d(2024, 3, 6), ViewMode::Week);
        assert_eq!(window.len(), 7);
        assert_eq!(window[0], d(2024, 3, 3));
        assert_eq!(window[6], d(2024, 3, 9));
        assert!(window.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn week_view_of_a_sunday_starts_with_itself() {
        let window = view_window(d(2024, 3, 3), ViewMode::Week);
        assert_eq!(window[0], d(2024, 3, 3));
        assert_eq!(window[6], d(2024, 3, 9));
    }

    #[test]
    fn week_view_spans_month_boundary() {
        // 2024-03-01 is a Friday; its week starts Sun 02-25.
        let window = view_window(d(2024, 3, 1), ViewMode::Week);
        assert_eq!(window[0], d(2024, 2, 25));
        assert_eq!(window[6], d(2024, 3, 2));
    }

    #[test]
    fn month_view_covers_leap_february() {
        let window = view_window(d(2024, 2, 10), ViewMode::Month);
        assert_eq!(window.len(), 29);
        assert_eq!(window[0], d(2024, 2, 1));
        assert_eq!(window[28], d(2024, 2, 29));
    }

    #[test]
    fn month_view_covers_plain_february() {
        let window = view_window(d(2023, 2, 10), ViewMode::Month);
        assert_eq!(window.len(), 28);
        assert_eq!(window[27], d(2023, 2, 28));
    }

    #[test]
    fn month_view_of_a_31_day_month() {
        let window = view_window(d(2024, 1, 15), ViewMode::Month);
        assert_eq!(window.len(), 31);
        assert_eq!(window[0], d(2024, 1, 1));
        assert_eq!(window[30], d(2024, 1, 31));
    }

    #[test]
    fn day_and_week_navigation() {
        assert_eq!(navigate(d(2024, 3, 1), ViewMode::Day, Nav::Prev), d(2024, 2, 29));
        assert_eq!(navigate(d(2024, 2, 29), ViewMode::Day, Nav::Next), d(2024, 3, 1));
        assert_eq!(navigate(d(2024, 3, 6), ViewMode::Week, Nav::Prev), d(2024, 2, 28));
        assert_eq!(navigate(d(2024, 3, 6), ViewMode::Week, Nav::Next), d(2024, 3, 13));
    }

    #[test]
    fn month_navigation_clamps_day_of_month() {
        // Jan 31 forward lands on leap-day Feb 29, not March 2nd.
        assert_eq!(navigate(d(2024, 1, 31), ViewMode::Month, Nav::Next), d(2024, 2, 29));
        // Mar 31 back clamps the same way.
        assert_eq!(navigate(d(2024, 3, 31), ViewMode::Month, Nav::Prev), d(2024, 2, 29));
        // Non-leap year clamps to the 28th.
        assert_eq!(navigate(d(2023, 1, 31), ViewMode::Month, Nav::Next), d(2023, 2, 28));
        // Mid-month days are left alone.
        assert_eq!(navigate(d(2024, 5, 15), ViewMode::Month, Nav::Prev), d(2024, 4, 15));
    }

    #[test]
    fn today_resets_the_reference() {
        let reference = d(1999, 1, 1);
        assert_eq!(
            navigate(reference, ViewMode::Week, Nav::Today),
            Local::now().date_naive()
        );
    }

    #[test]
    fn range_requires_both_bounds() {
        let err = parse_range(Some("2024-03-01"), None).unwrap_err();
        assert_eq!(
            err,
            TaskError::Validation("Start and end dates are required".into())
        );
        assert!(parse_range(None, None).is_err());
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        let err = parse_range(Some("2024-03-01"), Some("2024-02-01")).unwrap_err();
        assert_eq!(
            err,
            TaskError::Validation("End date must be after start date".into())
        );
    }

    #[test]
    fn range_accepts_single_day() {
        let (start, end) = parse_range(Some("2024-03-06"), Some("2024-03-06")).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn range_rejects_garbage_dates() {
        assert!(parse_range(Some("soon"), Some("2024-03-06")).is_err());
        assert!(parse_range(Some("2024-03-06"), Some("later")).is_err());
    }
}
