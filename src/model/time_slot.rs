use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Daily meeting time of a class section. Always `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> EngineResult<Self> {
        if start >= end {
            return Err(EngineError::invalid(format!(
                "start time {start} is not before end time {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Builds a slot from two client-supplied times.
    pub fn parse(start: &str, end: &str) -> EngineResult<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Intervals that only touch at a boundary do not overlap, so a class ending at 9:50
    /// and one starting at 9:50 can share a room.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Accepts `HH:MM`, `HH:MM:SS`, or a full date-time whose date part is discarded.
/// Sub-second precision is dropped.
fn parse_time(raw: &str) -> EngineResult<NaiveTime> {
    let raw = raw.trim();
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.time()))
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.time()))
        .map_err(|_| EngineError::invalid(format!("'{raw}' is not a time of day")))?;

    NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), parsed.second())
        .ok_or_else(|| EngineError::invalid(format!("'{raw}' is not a time of day")))
}
