//! Typed failures surfaced by the planner core.
//!
//! Conflict rejection is not in here: a conflicting insert is an
//! ordinary `false` from [`crate::store::EventStore::add`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u8),

    #[error("start hour {start} is after end hour {end}")]
    InvertedHours { start: u8, end: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no event at position {index} (store holds {len})")]
    NoSuchEvent { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("cannot move cursor from {from} by {delta} {unit}: date out of range")]
    OutOfRange {
        from: chrono::NaiveDate,
        delta: i64,
        unit: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read import file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("import line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("import line {line}: expansion scanned more than {limit} days")]
    ExpansionLimit { line: usize, limit: usize },
}

impl ImportError {
    /// 1-based line of the offending record, when the failure has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Io { .. } => None,
            Self::Malformed { line, .. } | Self::ExpansionLimit { line, .. } => Some(*line),
        }
    }
}
