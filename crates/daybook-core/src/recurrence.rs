//! Recurring-event descriptors and their day-by-day expansion.
//!
//! One record per line:
//!
//! ```text
//! name;year;monthStart;monthEnd;weekdayMask;hourStart;hourEnd
//! ```
//!
//! Months are 1-12. The mask uses `S M T W H F A` for Sunday through
//! Saturday. Expansion starts on the 1st of `monthStart` and stops the
//! first time the scan rolls into `monthEnd`, so the end month itself
//! is never included.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::Serialize;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::error::ImportError;
use crate::event::{
  Event,
  validate_hours
};
use crate::store::EventStore;

pub const FIELD_COUNT: usize = 7;

/// Default ceiling on days scanned for a single record.
pub const DEFAULT_MAX_SCAN_DAYS: usize =
  366;

/// Mask letters indexed by days from Sunday.
pub const WEEKDAY_LETTERS: [char; 7] =
  ['S', 'M', 'T', 'W', 'H', 'F', 'A'];

#[must_use]
pub fn weekday_letter(
  day: Weekday
) -> char {
  WEEKDAY_LETTERS
    [day.num_days_from_sunday() as usize]
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
  #[must_use]
  pub fn contains(
    self,
    day: Weekday
  ) -> bool {
    self.0
      & (1 << day.num_days_from_sunday())
      != 0
  }

  #[must_use]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl FromStr for WeekdayMask {
  type Err = std::convert::Infallible;

  /// Letters outside the mask alphabet never match a weekday and are
  /// ignored.
  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let mut bits = 0u8;
    for ch in s.chars() {
      match WEEKDAY_LETTERS
        .iter()
        .position(|letter| *letter == ch)
      {
        | Some(idx) => bits |= 1 << idx,
        | None => {
          debug!(letter = %ch, mask = %s, "ignoring unknown weekday letter");
        }
      }
    }
    Ok(Self(bits))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringRecord {
  pub name:        String,
  pub year:        i32,
  pub month_start: u32,
  pub month_end:   u32,
  pub weekdays:    WeekdayMask,
  pub start_hour:  u8,
  pub end_hour:    u8
}

impl RecurringRecord {
  /// Parses one descriptor line. The error is a human-readable reason;
  /// callers attach the line number.
  pub fn parse(
    line: &str
  ) -> Result<Self, String> {
    let fields: Vec<&str> =
      line.split(';').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
      return Err(format!(
        "expected {FIELD_COUNT} \
         fields, found {}",
        fields.len()
      ));
    }

    let year: i32 =
      parse_number(fields[1], "year")?;
    let month_start =
      parse_month(fields[2], "monthStart")?;
    let month_end =
      parse_month(fields[3], "monthEnd")?;
    let start_hour: u8 =
      parse_number(fields[5], "hourStart")?;
    let end_hour: u8 =
      parse_number(fields[6], "hourEnd")?;
    validate_hours(start_hour, end_hour)
      .map_err(|err| err.to_string())?;

    if NaiveDate::from_ymd_opt(
      year,
      month_start,
      1
    )
    .is_none()
    {
      return Err(format!(
        "year {year} is out of range"
      ));
    }

    let weekdays = fields[4]
      .parse::<WeekdayMask>()
      .unwrap_or_default();

    Ok(Self {
      name: fields[0].to_string(),
      year,
      month_start,
      month_end,
      weekdays,
      start_hour,
      end_hour
    })
  }

  /// Concrete events for every matching day in the scan window.
  ///
  /// Runs at least once (the 1st of `month_start`), then advances a
  /// day at a time until the scan date's month equals `month_end`.
  /// When `month_end <= month_start` the scan wraps into the next
  /// year before it stops. `None` means more than `max_days` days
  /// were scanned or the calendar ran out.
  pub fn occurrences(
    &self,
    max_days: usize
  ) -> Option<Vec<Event>> {
    let mut scan = NaiveDate::from_ymd_opt(
      self.year,
      self.month_start,
      1
    )?;
    let mut scanned = 0usize;
    let mut out = Vec::new();

    loop {
      scanned += 1;
      if scanned > max_days {
        return None;
      }

      if self.weekdays.contains(scan.weekday())
      {
        let event = Event::new(
          self.name.clone(),
          scan,
          self.start_hour,
          self.end_hour
        )
        .ok()?;
        out.push(event);
      }

      scan = scan.succ_opt()?;
      if scan.month() == self.month_end {
        break;
      }
    }

    Some(out)
  }
}

fn parse_number<T: FromStr>(
  raw: &str,
  field: &str
) -> Result<T, String> {
  raw.parse::<T>().map_err(|_| {
    format!(
      "{field} is not a valid number: \
       {raw:?}"
    )
  })
}

fn parse_month(
  raw: &str,
  field: &str
) -> Result<u32, String> {
  let month: u32 =
    parse_number(raw, field)?;
  if !(1..=12).contains(&month) {
    return Err(format!(
      "{field} must be 1-12, got \
       {month}"
    ));
  }
  Ok(month)
}

/// Outcome of a successful import.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize,
)]
pub struct ImportReport {
  pub records:   usize,
  pub generated: usize,
  pub added:     usize,
  pub skipped:   usize
}

/// Reads the whole file, then imports it with [`import_str`].
#[instrument(skip(store))]
pub fn import_file(
  store: &mut EventStore,
  path: &Path,
  max_days: usize
) -> Result<ImportReport, ImportError> {
  let text = fs::read_to_string(path)
    .map_err(|source| ImportError::Io {
      path: path.to_path_buf(),
      source
    })?;
  import_str(store, &text, max_days)
}

/// Expands each record in order and feeds its occurrences to the
/// store. Conflicting occurrences are dropped and counted. A bad line
/// stops the import; records before it stay in the store.
#[instrument(skip(store, text))]
pub fn import_str(
  store: &mut EventStore,
  text: &str,
  max_days: usize
) -> Result<ImportReport, ImportError> {
  let mut report = ImportReport::default();

  for (idx, raw_line) in
    text.lines().enumerate()
  {
    let line = idx + 1;
    if raw_line.trim().is_empty() {
      continue;
    }

    let record =
      RecurringRecord::parse(raw_line)
        .map_err(|reason| {
          ImportError::Malformed {
            line,
            reason
          }
        })?;

    let Some(events) =
      record.occurrences(max_days)
    else {
      warn!(line, limit = max_days, name = %record.name, "expansion guard tripped");
      return Err(
        ImportError::ExpansionLimit {
          line,
          limit: max_days
        }
      );
    };

    report.records += 1;
    report.generated += events.len();
    for event in events {
      if store.add(event) {
        report.added += 1;
      } else {
        report.skipped += 1;
      }
    }
    debug!(line, name = %record.name, ?report, "record applied");
  }

  info!(
    records = report.records,
    generated = report.generated,
    added = report.added,
    skipped = report.skipped,
    "import finished"
  );
  Ok(report)
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    NaiveDate,
    Weekday
  };

  use super::{
    DEFAULT_MAX_SCAN_DAYS,
    RecurringRecord,
    WeekdayMask,
    import_str,
    weekday_letter
  };
  use crate::error::ImportError;
  use crate::event::Event;
  use crate::store::EventStore;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn mask_letters_follow_fixed_alphabet()
  {
    assert_eq!(
      weekday_letter(Weekday::Sun),
      'S'
    );
    assert_eq!(
      weekday_letter(Weekday::Tue),
      'T'
    );
    assert_eq!(
      weekday_letter(Weekday::Thu),
      'H'
    );
    assert_eq!(
      weekday_letter(Weekday::Sat),
      'A'
    );

    let mask: WeekdayMask =
      "HA".parse().expect("infallible");
    assert!(mask.contains(Weekday::Thu));
    assert!(mask.contains(Weekday::Sat));
    assert!(!mask.contains(Weekday::Tue));
    assert!(!mask.contains(Weekday::Sun));

    let odd: WeekdayMask =
      "mx".parse().expect("infallible");
    assert!(odd.is_empty());
  }

  #[test]
  fn gym_record_covers_february_only() {
    let record = RecurringRecord::parse(
      "Gym;2024;2;3;MW;18;19"
    )
    .expect("valid record");
    let dates: Vec<NaiveDate> = record
      .occurrences(DEFAULT_MAX_SCAN_DAYS)
      .expect("bounded")
      .iter()
      .map(Event::date)
      .collect();

    let expected: Vec<NaiveDate> = [
      5, 7, 12, 14, 19, 21, 26, 28
    ]
    .iter()
    .map(|d| day(2024, 2, *d))
    .collect();
    assert_eq!(dates, expected);
  }

  #[test]
  fn end_month_equal_to_start_scans_one_day()
  {
    // 2024-05-01 is a Wednesday.
    let hit = RecurringRecord::parse(
      "x;2024;5;5;W;8;9"
    )
    .expect("valid record")
    .occurrences(DEFAULT_MAX_SCAN_DAYS)
    .expect("bounded");
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].date(), day(2024, 5, 1));

    let miss = RecurringRecord::parse(
      "x;2024;5;5;M;8;9"
    )
    .expect("valid record")
    .occurrences(DEFAULT_MAX_SCAN_DAYS)
    .expect("bounded");
    assert!(miss.is_empty());
  }

  #[test]
  fn wrapped_range_runs_into_next_year() {
    let events = RecurringRecord::parse(
      "x;2024;12;2;SMTWHFA;8;9"
    )
    .expect("valid record")
    .occurrences(DEFAULT_MAX_SCAN_DAYS)
    .expect("bounded");
    assert_eq!(events.len(), 31 + 31);
    let last = events
      .last()
      .map(Event::date)
      .expect("non-empty");
    assert_eq!(last, day(2025, 1, 31));
  }

  #[test]
  fn guard_trips_before_store_is_touched()
  {
    let mut store = EventStore::new();
    let err = import_str(
      &mut store,
      "x;2024;1;3;SMTWHFA;8;9",
      10
    )
    .unwrap_err();
    assert!(matches!(
      err,
      ImportError::ExpansionLimit {
        line:  1,
        limit: 10
      }
    ));
    assert!(store.is_empty());
  }

  #[test]
  fn malformed_lines_are_reported() {
    let cases = [
      "Gym;2024;2;3;MW;18",
      "Gym;2024;2;3;MW;18;19;extra",
      "Gym;twenty;2;3;MW;18;19",
      "Gym;2024;0;3;MW;18;19",
      "Gym;2024;2;13;MW;18;19",
      "Gym;2024;2;3;MW;18;24",
      "Gym;2024;2;3;MW;19;18",
      "Gym;2024;2;3;MW;-1;18"
    ];
    for case in cases {
      assert!(
        RecurringRecord::parse(case)
          .is_err(),
        "{case} should be rejected"
      );
    }
  }

  #[test]
  fn bad_line_keeps_earlier_records() {
    let mut store = EventStore::new();
    let text = "A;2024;2;3;M;9;10\n\
                \n\
                B;2024;2;3;W;nine;10\n\
                C;2024;2;3;F;9;10\n";
    let err = import_str(
      &mut store,
      text,
      DEFAULT_MAX_SCAN_DAYS
    )
    .unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert_eq!(store.len(), 4);
    assert!(
      store
        .iter()
        .all(|e| e.name() == "A"
          && e.date().weekday()
            == Weekday::Mon)
    );
  }

  #[test]
  fn conflicting_occurrence_is_skipped() {
    let mut store = EventStore::new();
    assert!(store.add(
      Event::new(
        "dentist",
        day(2024, 2, 12),
        17,
        19
      )
      .expect("valid")
    ));

    let report = import_str(
      &mut store,
      "Gym;2024;2;3;MW;18;19",
      DEFAULT_MAX_SCAN_DAYS
    )
    .expect("import ok");
    assert_eq!(report.records, 1);
    assert_eq!(report.generated, 8);
    assert_eq!(report.added, 7);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.len(), 8);
    assert!(!store.iter().any(|e| {
      e.name() == "Gym"
        && e.date() == day(2024, 2, 12)
    }));
  }
}
