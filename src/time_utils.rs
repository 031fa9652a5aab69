// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and calendar weeks.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Utc,
    Weekday,
};

/// Length of a goal week.
pub const WEEK_DAYS: i64 = 7;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Local calendar used for day and week boundaries.
///
/// Weeks start at local midnight of `first_day` and are exactly seven
/// days long. Membership tests use the half-open `[start, end)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekCalendar {
    pub first_day: Weekday,
    pub offset: FixedOffset,
}

impl Default for WeekCalendar {
    fn default() -> Self {
        Self {
            first_day: Weekday::Sun,
            offset: Utc.fix(),
        }
    }
}

impl WeekCalendar {
    pub fn new(first_day: Weekday, offset: FixedOffset) -> Self {
        Self { first_day, offset }
    }

    /// Local calendar day containing `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of local midnight on `date`.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        utc.and_utc()
    }

    /// Start of the local day after the one containing `at`.
    pub fn next_day_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start(self.local_date(at)) + Duration::days(1)
    }

    /// Start of the week containing `at`.
    pub fn week_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = self.local_date(at);
        let days_back = (date.weekday().num_days_from_sunday() + 7
            - self.first_day.num_days_from_sunday())
            % 7;
        self.day_start(date - Duration::days(i64::from(days_back)))
    }

    /// `[start, end)` of the week containing `at`.
    pub fn week_bounds(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.week_start(at);
        (start, start + Duration::days(WEEK_DAYS))
    }

    /// `[start, end)` of the week before the one containing `at`.
    pub fn previous_week_bounds(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.week_start(at);
        (start - Duration::days(WEEK_DAYS), start)
    }
}

/// Parse a weekday name such as "sunday" or "Mon".
pub fn parse_weekday(raw: &str) -> Option<Weekday> {
    raw.trim().parse::<Weekday>().ok()
}
