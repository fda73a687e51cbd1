//! Time-of-day send window.

use core::fmt;
use core::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use payremind_core::{ValidationError, ValueObject};

static TIME_OF_DAY_RE: OnceLock<Regex> = OnceLock::new();

fn time_of_day_regex() -> &'static Regex {
    TIME_OF_DAY_RE.get_or_init(|| {
        Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$")
            .unwrap_or_else(|error| panic!("time of day regex failed to compile: {error}"))
    })
}

/// Wall-clock time with minute resolution, written as 24-hour `HH:MM`.
///
/// A single-digit hour (`8:30`) is accepted on input; output is always
/// zero-padded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl ValueObject for TimeOfDay {}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeFormat(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimeFormat(value.to_string());
        let caps = time_of_day_regex().captures(value).ok_or_else(invalid)?;
        let hour = caps[1].parse::<u8>().map_err(|_| invalid())?;
        let minute = caps[2].parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }

    /// Time of day of `instant`, read in the instant's own time zone.
    /// Seconds and date are discarded.
    pub fn of<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self {
            // chrono guarantees hour < 24 and minute < 60
            hour: instant.hour() as u8,
            minute: instant.minute() as u8,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Daily window during which automatic messages may be sent.
///
/// Both bounds are inclusive. When `start > end` the window wraps past
/// midnight (e.g. `22:00`–`05:00`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWindow {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl ValueObject for SendWindow {}

impl SendWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(TimeOfDay::parse(start)?, TimeOfDay::parse(end)?))
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.end
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Whether `now`, read as a wall-clock time in its own zone, falls inside
    /// the window.
    pub fn contains<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let start = self.start.minutes_since_midnight();
        let end = self.end.minutes_since_midnight();
        let current = TimeOfDay::of(now).minutes_since_midnight();

        if start <= end {
            current >= start && current <= end
        } else {
            current >= start || current <= end
        }
    }
}

impl Default for SendWindow {
    /// `08:00`–`18:00`.
    fn default() -> Self {
        Self {
            start: TimeOfDay { hour: 8, minute: 0 },
            end: TimeOfDay { hour: 18, minute: 0 },
        }
    }
}
