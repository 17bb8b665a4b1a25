use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_SHIFT_HOURS: u32 = 24;

/// A wall-clock hour/minute pair as captured on shift and timesheet forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidClockTime { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub const fn hour(self) -> u32 {
        self.hour
    }

    pub const fn minute(self) -> u32 {
        self.minute
    }

    pub const fn minutes_of_day(self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.minutes_of_day() * 60, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let malformed = || ScheduleError::MalformedClockTime {
            value: trimmed.to_string(),
        };
        let (hour, minute) = trimmed.split_once(':').ok_or_else(malformed)?;
        let hour = hour.parse::<u32>().map_err(|_| malformed())?;
        let minute = minute.parse::<u32>().map_err(|_| malformed())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Raw schedule fields before rollover is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub date: NaiveDate,
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub ends_next_day: Option<bool>,
}

/// Fully resolved start/end instants with the rollover decision applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchedule {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub rollover: bool,
}

impl CanonicalSchedule {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Upper bound on a single shift, guarding against data-entry mistakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleLimits {
    max_duration_minutes: i64,
}

impl ScheduleLimits {
    pub fn from_hours(hours: u32) -> Self {
        Self {
            max_duration_minutes: i64::from(hours.max(1)) * 60,
        }
    }

    pub fn max_duration_minutes(&self) -> i64 {
        self.max_duration_minutes
    }
}

impl Default for ScheduleLimits {
    fn default() -> Self {
        Self::from_hours(DEFAULT_MAX_SHIFT_HOURS)
    }
}

/// Validation failures for schedules and shift definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("clock time {hour:02}:{minute:02} is out of range")]
    InvalidClockTime { hour: u32, minute: u32 },
    #[error("clock time '{value}' must use HH:MM")]
    MalformedClockTime { value: String },
    #[error("shift starting at {at} has zero length")]
    ZeroLength { at: NaiveDateTime },
    #[error("shift end {end} is not after start {start}")]
    EndNotAfterStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("shift lasts {minutes} minutes, exceeding the {max_minutes} minute maximum")]
    ExceedsMaximum { minutes: i64, max_minutes: i64 },
    #[error("break of {break_minutes} minutes does not fit in a {duration_minutes} minute shift")]
    BreakTooLong {
        break_minutes: u32,
        duration_minutes: i64,
    },
    #[error("shift role must not be empty")]
    MissingRole,
    #[error("hourly rate must be positive (found {rate})")]
    NonPositiveRate { rate: Decimal },
    #[error("hourly rate {rate} has more precision than whole pennies")]
    SubPennyRate { rate: Decimal },
    #[error("shift quantity must be at least 1")]
    ZeroQuantity,
}

/// Resolve a date plus start/end wall-clock times into canonical instants.
///
/// An end earlier than the start rolls over to the next day. An explicit `ends_next_day` hint
/// overrides the derived flag, which is how a 24 hour shift with identical start and end times
/// is expressed.
pub fn normalize(
    input: &ScheduleInput,
    limits: &ScheduleLimits,
) -> Result<CanonicalSchedule, ScheduleError> {
    let derived = input.end.minutes_of_day() < input.start.minutes_of_day();
    let rollover = input.ends_next_day.unwrap_or(derived);

    let start = input.date.and_time(input.start.to_naive());
    let end_date = if rollover {
        input.date + Duration::days(1)
    } else {
        input.date
    };
    let end = end_date.and_time(input.end.to_naive());

    if end == start {
        return Err(ScheduleError::ZeroLength { at: start });
    }
    if end < start {
        return Err(ScheduleError::EndNotAfterStart { start, end });
    }

    let schedule = CanonicalSchedule {
        start,
        end,
        rollover,
    };
    let minutes = schedule.duration_minutes();
    if minutes > limits.max_duration_minutes() {
        return Err(ScheduleError::ExceedsMaximum {
            minutes,
            max_minutes: limits.max_duration_minutes(),
        });
    }

    Ok(schedule)
}

/// Resolve a clock-in/clock-out pair recorded against a work date.
///
/// Clock-out earlier than clock-in means the worker left after midnight. Equal times resolve to
/// a zero-length period, which the pay calculator rejects.
pub fn resolve_clock_pair(
    work_date: NaiveDate,
    clock_in: ClockTime,
    clock_out: ClockTime,
) -> CanonicalSchedule {
    let rollover = clock_out.minutes_of_day() < clock_in.minutes_of_day();
    let start = work_date.and_time(clock_in.to_naive());
    let end_date = if rollover {
        work_date + Duration::days(1)
    } else {
        work_date
    };

    CanonicalSchedule {
        start,
        end: end_date.and_time(clock_out.to_naive()),
        rollover,
    }
}
