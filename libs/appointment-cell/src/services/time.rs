// libs/appointment-cell/src/services/time.rs
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchedulingError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;
pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 180;
pub const DURATION_STEP_MINUTES: u32 = 15;

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9]) (AM|PM)$").ok())
        .as_ref()
}

/// Wall-clock time at minute granularity, stored as minutes since midnight (0..=1439).
///
/// Serialized as `H:MM AM/PM` (hour not zero-padded), which is also what
/// [`format_time`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Result<Self, SchedulingError> {
        if minutes < MINUTES_PER_DAY {
            Ok(Self(minutes))
        } else {
            Err(SchedulingError::InvalidFormat(format!("{} minutes", minutes)))
        }
    }

    /// Values past the end of the day clamp to 11:59 PM.
    pub const fn saturating_from_minutes(minutes: u16) -> Self {
        if minutes < MINUTES_PER_DAY {
            Self(minutes)
        } else {
            Self(MINUTES_PER_DAY - 1)
        }
    }

    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Hour on the 24-hour clock.
    pub const fn hour(self) -> u16 {
        self.0 / 60
    }

    pub const fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hour = self.hour();
        let period = if hour < 12 { "AM" } else { "PM" };
        let display_hour = match hour % 12 {
            0 => 12,
            h => h,
        };
        write!(f, "{}:{:02} {}", display_hour, self.minute(), period)
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_time(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse `HH:MM AM/PM` using the 12-hour to 24-hour rule
/// (12 AM -> 0, 12 PM -> 12, any other PM hour gains 12).
///
/// The pattern admits hour tokens up to 23; a token that lands past the end of
/// the day once converted (e.g. `13:00 PM`) is rejected.
pub fn parse_time(s: &str) -> Result<TimeOfDay, SchedulingError> {
    let invalid = || SchedulingError::InvalidFormat(s.to_string());

    let captures = time_pattern()
        .and_then(|pattern| pattern.captures(s))
        .ok_or_else(invalid)?;
    let mut hour: u16 = captures[1].parse().map_err(|_| invalid())?;
    let minute: u16 = captures[2].parse().map_err(|_| invalid())?;

    match &captures[3] {
        "PM" if hour != 12 => hour += 12,
        "AM" if hour == 12 => hour = 0,
        _ => {}
    }

    TimeOfDay::from_minutes(hour * 60 + minute).map_err(|_| invalid())
}

pub fn format_time(minutes: u16) -> Result<String, SchedulingError> {
    TimeOfDay::from_minutes(minutes).map(|t| t.to_string())
}

/// Half-open grid of slot starts `[open, close)` stepping by `interval` minutes.
///
/// `Copy`, so iterating never consumes it; every call to `iter()` restarts
/// from `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    open: u16,
    close: u16,
    step: u16,
}

impl SlotRange {
    pub fn iter(&self) -> Slots {
        Slots {
            next: self.open,
            close: self.close,
            step: self.step,
        }
    }

    pub fn len(&self) -> usize {
        if self.step == 0 || self.open >= self.close {
            return 0;
        }
        let span = (self.close - self.open) as usize;
        let step = self.step as usize;
        (span + step - 1) / step
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for SlotRange {
    type Item = TimeOfDay;
    type IntoIter = Slots;

    fn into_iter(self) -> Slots {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Slots {
    next: u16,
    close: u16,
    step: u16,
}

impl Iterator for Slots {
    type Item = TimeOfDay;

    fn next(&mut self) -> Option<TimeOfDay> {
        if self.step == 0 || self.next >= self.close {
            return None;
        }
        let current = TimeOfDay(self.next);
        self.next = self.next.saturating_add(self.step);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = SlotRange { open: self.next, close: self.close, step: self.step }.len();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Slots {}

/// Every slot start `t` with `open <= t < close`, ascending. Empty when
/// `open >= close` or the interval is zero.
pub fn enumerate_slots(open: TimeOfDay, close: TimeOfDay, interval_minutes: u32) -> SlotRange {
    let step = u16::try_from(interval_minutes).unwrap_or(u16::MAX);
    SlotRange {
        open: open.minutes(),
        close: close.minutes(),
        step,
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`;
/// timestamps contribute their calendar date only.
pub fn parse_date(s: &str) -> Result<NaiveDate, SchedulingError> {
    let trimmed = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(timestamp.date());
    }

    Err(SchedulingError::InvalidDate(s.to_string()))
}

pub fn validate_duration(duration_minutes: u32) -> Result<u32, SchedulingError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes)
        && duration_minutes % DURATION_STEP_MINUTES == 0
    {
        Ok(duration_minutes)
    } else {
        Err(SchedulingError::InvalidDuration(duration_minutes))
    }
}

/// A booking window on one calendar day: `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub date: NaiveDate,
    pub start: TimeOfDay,
    duration_minutes: u32,
}

impl Interval {
    pub fn new(date: NaiveDate, start: TimeOfDay, duration_minutes: u32) -> Result<Self, SchedulingError> {
        Ok(Self {
            date,
            start,
            duration_minutes: validate_duration(duration_minutes)?,
        })
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn start_minute(&self) -> u32 {
        self.start.minutes() as u32
    }

    /// May run past midnight (e.g. 11:30 PM + 60); not clamped.
    pub fn end_minute(&self) -> u32 {
        self.start_minute() + self.duration_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_twelve_hour_edges() {
        assert_eq!(parse_time("12:00 AM").unwrap().minutes(), 0);
        assert_eq!(parse_time("12:30 PM").unwrap().minutes(), 750);
        assert_eq!(parse_time("08:00 AM").unwrap().minutes(), 480);
        assert_eq!(parse_time("8:00 AM").unwrap().minutes(), 480);
        assert_eq!(parse_time("05:00 PM").unwrap().minutes(), 1020);
        assert_eq!(parse_time("11:59 PM").unwrap().minutes(), 1439);
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["8:00", "08:60 AM", "24:00 AM", "8:00 am", " 8:00 AM", "8:0 AM", "13:00 PM"] {
            assert_matches!(parse_time(bad), Err(SchedulingError::InvalidFormat(_)), "{}", bad);
        }
    }

    #[test]
    fn formats_without_hour_padding() {
        assert_eq!(format_time(0).unwrap(), "12:00 AM");
        assert_eq!(format_time(480).unwrap(), "8:00 AM");
        assert_eq!(format_time(725).unwrap(), "12:05 PM");
        assert_eq!(format_time(1439).unwrap(), "11:59 PM");
        assert!(format_time(1440).is_err());
    }

    #[test]
    fn serde_uses_display_form() {
        let t = parse_time("09:15 AM").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"9:15 AM\"");
        let back: TimeOfDay = serde_json::from_str("\"09:15 AM\"").unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<TimeOfDay>("\"9:15\"").is_err());
    }

    #[test]
    fn slot_range_is_restartable() {
        let range = enumerate_slots(parse_time("8:00 AM").unwrap(), parse_time("9:00 AM").unwrap(), 30);
        let first: Vec<_> = range.iter().collect();
        let second: Vec<_> = range.into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(range.iter().len(), 2);
    }

    #[test]
    fn zero_interval_yields_nothing() {
        let range = enumerate_slots(parse_time("8:00 AM").unwrap(), parse_time("9:00 AM").unwrap(), 0);
        assert!(range.is_empty());
        assert_eq!(range.iter().next(), None);
    }

    #[test]
    fn parses_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2030, 3, 14).unwrap();
        assert_eq!(parse_date("2030-03-14").unwrap(), expected);
        assert_eq!(parse_date("2030-03-14T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_date("2030-03-14T10:30:00").unwrap(), expected);
        assert_matches!(parse_date("14/03/2030"), Err(SchedulingError::InvalidDate(_)));
        assert_matches!(parse_date("2030-02-30"), Err(SchedulingError::InvalidDate(_)));
    }

    #[test]
    fn interval_duration_is_quantized() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let start = parse_time("10:00 AM").unwrap();
        assert!(Interval::new(date, start, 15).is_ok());
        assert!(Interval::new(date, start, 180).is_ok());
        assert_matches!(Interval::new(date, start, 0), Err(SchedulingError::InvalidDuration(0)));
        assert_matches!(Interval::new(date, start, 20), Err(SchedulingError::InvalidDuration(20)));
        assert_matches!(Interval::new(date, start, 195), Err(SchedulingError::InvalidDuration(195)));

        let interval = Interval::new(date, start, 45).unwrap();
        assert_eq!(interval.end_minute(), 600 + 45);
    }
}
