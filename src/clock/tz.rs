//! POSIX `TZ` rule evaluation
//!
//! Supports the `std offset [dst [offset] [,start[/time],end[/time]]]` form
//! with `Mm.w.d` transition dates, e.g. `CET-1CEST,M3.5.0,M10.5.0/3`.
//! Offsets follow POSIX sign convention (west of Greenwich is positive), so
//! `CET-1` is one hour *ahead* of UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use thiserror::Error;

/// Transition rules applied when a DST name is given without explicit dates
const DEFAULT_DST_RULES: &str = "M3.2.0,M11.1.0";

/// Transitions happen at 02:00 local time unless a `/time` is given
const DEFAULT_TRANSITION_SECS: i64 = 2 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TzError {
    #[error("empty timezone rule")]
    Empty,

    #[error("invalid zone name at '{0}'")]
    InvalidName(String),

    #[error("invalid UTC offset at '{0}'")]
    InvalidOffset(String),

    #[error("invalid transition rule at '{0}' (only Mm.w.d is supported)")]
    InvalidTransition(String),

    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    month: u32,
    week: u32,
    weekday: u32,
    time_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Daylight {
    name: String,
    offset_secs: i64,
    start: Transition,
    end: Transition,
}

/// A parsed POSIX timezone rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzRule {
    source: String,
    std_name: String,
    std_offset_secs: i64,
    dst: Option<Daylight>,
}

impl TzRule {
    /// Plain UTC, no daylight saving
    pub fn utc() -> Self {
        Self {
            source: "UTC0".to_string(),
            std_name: "UTC".to_string(),
            std_offset_secs: 0,
            dst: None,
        }
    }

    pub fn std_name(&self) -> &str {
        &self.std_name
    }

    pub fn dst_name(&self) -> Option<&str> {
        self.dst.as_ref().map(|d| d.name.as_str())
    }

    /// Offset east of UTC in effect at `utc`
    pub fn utc_offset_secs(&self, utc: NaiveDateTime) -> i64 {
        match &self.dst {
            Some(dst) if self.in_daylight(dst, utc) => dst.offset_secs,
            _ => self.std_offset_secs,
        }
    }

    /// Convert a UTC instant into local wall-clock time
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        let naive = utc.naive_utc();
        naive + TimeDelta::seconds(self.utc_offset_secs(naive))
    }

    fn in_daylight(&self, dst: &Daylight, utc: NaiveDateTime) -> bool {
        let year = utc.year();
        let (Some(start_local), Some(end_local)) = (
            transition_local(year, dst.start),
            transition_local(year, dst.end),
        ) else {
            return false;
        };
        // Start is expressed in standard time, end in daylight time.
        let start = start_local - TimeDelta::seconds(self.std_offset_secs);
        let end = end_local - TimeDelta::seconds(dst.offset_secs);

        if start < end {
            utc >= start && utc < end
        } else {
            // Southern hemisphere: DST spans the new year.
            !(utc >= end && utc < start)
        }
    }
}

/// Local date-time at which `rule` fires in `year`
fn transition_local(year: i32, rule: Transition) -> Option<NaiveDateTime> {
    let first = NaiveDate::from_ymd_opt(year, rule.month, 1)?;
    let first_weekday = first.weekday().num_days_from_sunday();
    let mut day = 1 + (rule.weekday + 7 - first_weekday) % 7 + (rule.week - 1) * 7;
    // Week 5 means "last", which may be the 4th occurrence.
    while NaiveDate::from_ymd_opt(year, rule.month, day).is_none() {
        day -= 7;
    }
    let midnight = NaiveDate::from_ymd_opt(year, rule.month, day)?.and_hms_opt(0, 0, 0)?;
    Some(midnight + TimeDelta::seconds(rule.time_secs))
}

impl FromStr for TzRule {
    type Err = TzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        if source.is_empty() {
            return Err(TzError::Empty);
        }

        let mut cursor = Cursor { rest: source };
        let std_name = cursor.name()?;
        let std_offset_secs = -cursor.offset()?;

        if cursor.is_empty() {
            return Ok(Self {
                source: source.to_string(),
                std_name,
                std_offset_secs,
                dst: None,
            });
        }

        let dst_name = cursor.name()?;
        let dst_offset_secs = if cursor.is_empty() || cursor.peek() == Some(',') {
            std_offset_secs + 3600
        } else {
            -cursor.offset()?
        };

        let (start, end) = if cursor.is_empty() {
            let mut defaults = Cursor {
                rest: DEFAULT_DST_RULES,
            };
            let start = defaults.transition()?;
            defaults.expect(',')?;
            (start, defaults.transition()?)
        } else {
            cursor.expect(',')?;
            let start = cursor.transition()?;
            cursor.expect(',')?;
            (start, cursor.transition()?)
        };

        if !cursor.is_empty() {
            return Err(TzError::TrailingInput(cursor.rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            std_name,
            std_offset_secs,
            dst: Some(Daylight {
                name: dst_name,
                offset_secs: dst_offset_secs,
                start,
                end,
            }),
        })
    }
}

impl fmt::Display for TzRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self.rest.find(|c: char| !pred(c)).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn expect(&mut self, c: char) -> Result<(), TzError> {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(TzError::InvalidTransition(self.rest.to_string())),
        }
    }

    fn name(&mut self) -> Result<String, TzError> {
        if let Some(quoted) = self.rest.strip_prefix('<') {
            let close = quoted
                .find('>')
                .ok_or_else(|| TzError::InvalidName(self.rest.to_string()))?;
            let name = &quoted[..close];
            self.rest = &quoted[close + 1..];
            if name.is_empty() {
                return Err(TzError::InvalidName(self.rest.to_string()));
            }
            return Ok(name.to_string());
        }

        let at = self.rest;
        let name = self.take_while(|c| c.is_ascii_alphabetic());
        if name.len() < 3 {
            return Err(TzError::InvalidName(at.to_string()));
        }
        Ok(name.to_string())
    }

    /// `[+-]hh[:mm[:ss]]` in seconds, POSIX sign
    fn offset(&mut self) -> Result<i64, TzError> {
        let at = self.rest;
        self.signed_hms()
            .ok_or_else(|| TzError::InvalidOffset(at.to_string()))
    }

    fn signed_hms(&mut self) -> Option<i64> {
        let sign = match self.peek() {
            Some('-') => {
                self.rest = &self.rest[1..];
                -1
            }
            Some('+') => {
                self.rest = &self.rest[1..];
                1
            }
            _ => 1,
        };

        let hours: i64 = self.take_while(|c| c.is_ascii_digit()).parse().ok()?;
        let mut secs = hours * 3600;
        for scale in [60, 1] {
            if self.peek() != Some(':') {
                break;
            }
            self.rest = &self.rest[1..];
            let part: i64 = self.take_while(|c| c.is_ascii_digit()).parse().ok()?;
            if part > 59 {
                return None;
            }
            secs += part * scale;
        }
        if hours > 167 {
            return None;
        }
        Some(sign * secs)
    }

    fn number(&mut self) -> Option<u32> {
        self.take_while(|c| c.is_ascii_digit()).parse().ok()
    }

    fn transition(&mut self) -> Result<Transition, TzError> {
        let at = self.rest;
        let invalid = || TzError::InvalidTransition(at.to_string());

        self.rest = self.rest.strip_prefix('M').ok_or_else(invalid)?;
        let month = self.number().ok_or_else(invalid)?;
        self.rest = self.rest.strip_prefix('.').ok_or_else(invalid)?;
        let week = self.number().ok_or_else(invalid)?;
        self.rest = self.rest.strip_prefix('.').ok_or_else(invalid)?;
        let weekday = self.number().ok_or_else(invalid)?;

        if !(1..=12).contains(&month) || !(1..=5).contains(&week) || weekday > 6 {
            return Err(invalid());
        }

        let time_secs = if self.peek() == Some('/') {
            self.rest = &self.rest[1..];
            self.signed_hms().ok_or_else(invalid)?
        } else {
            DEFAULT_TRANSITION_SECS
        };

        Ok(Transition {
            month,
            week,
            weekday,
            time_secs,
        })
    }
}
