use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

pub const LAST_HOUR: u8 = 23;

/// A named block of whole hours on one calendar day.
///
/// Fields are fixed once built. Moving an event to another slot goes
/// through [`crate::store::EventStore::replace`] so the store can
/// re-check it against everything else it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    name: String,
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8,
}

#[derive(Deserialize)]
struct RawEvent {
    name: String,
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8,
}

impl TryFrom<RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Event::new(raw.name, raw.date, raw.start_hour, raw.end_hour)
    }
}

/// Checks an hour span the same way [`Event::new`] does.
pub fn validate_hours(start_hour: u8, end_hour: u8) -> Result<(), EventError> {
    for hour in [start_hour, end_hour] {
        if hour > LAST_HOUR {
            return Err(EventError::HourOutOfRange(hour));
        }
    }
    if start_hour > end_hour {
        return Err(EventError::InvertedHours {
            start: start_hour,
            end: end_hour,
        });
    }
    Ok(())
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        date: NaiveDate,
        start_hour: u8,
        end_hour: u8,
    ) -> Result<Self, EventError> {
        validate_hours(start_hour, end_hour)?;
        Ok(Self {
            name: name.into(),
            date,
            start_hour,
            end_hour,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start_hour(&self) -> u8 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u8 {
        self.end_hour
    }

    pub fn is_zero_length(&self) -> bool {
        self.start_hour == self.end_hour
    }

    /// Same name, new slot. Validated like a fresh event.
    pub fn rescheduled(
        &self,
        date: NaiveDate,
        start_hour: u8,
        end_hour: u8,
    ) -> Result<Self, EventError> {
        Self::new(self.name.clone(), date, start_hour, end_hour)
    }

    /// True when both events sit on the same day and their `[start, end)`
    /// hour spans overlap. Touching endpoints do not overlap, and a
    /// zero-length event never conflicts with anything.
    pub fn conflicts(&self, other: &Event) -> bool {
        if self.date != other.date {
            return false;
        }
        if self.is_zero_length() || other.is_zero_length() {
            return false;
        }
        self.start_hour < other.end_hour && other.start_hour < self.end_hour
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event: {}  {}/{}/{} Time: ({}-{})",
            self.name,
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.start_hour,
            self.end_hour
        )
    }
}
