use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Calendar timestamp produced by a successful clock read
///
/// Fields are private so a `TimePoint` always names a real calendar instant;
/// the only ways to obtain one are [`TimePoint::new`] and
/// [`TimePoint::from_naive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimePoint {
    /// Build a time point, rejecting impossible dates and times
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        NaiveDate::from_ymd_opt(year.into(), month.into(), day.into())?;
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Convert a local wall-clock reading. Leap seconds fold into second 59.
    pub fn from_naive(local: NaiveDateTime) -> Option<Self> {
        let year = u16::try_from(local.year()).ok()?;
        Self::new(
            year,
            local.month() as u8,
            local.day() as u8,
            local.hour() as u8,
            local.minute() as u8,
            local.second().min(59) as u8,
        )
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// `HH:MM:SS`, or `HH:MM` when seconds are omitted
    pub fn time_string(&self, include_seconds: bool) -> String {
        if include_seconds {
            format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
        } else {
            format!("{:02}:{:02}", self.hour, self.minute)
        }
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_string(), self.time_string(true))
    }
}
