use chrono::{
  Datelike,
  Duration,
  Local,
  Months,
  NaiveDate
};
use tracing::trace;

use crate::error::CursorError;

/// The movable "current date" that day, week and month views are
/// anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCursor {
  date: NaiveDate
}

impl DateCursor {
  pub fn new(date: NaiveDate) -> Self {
    Self { date }
  }

  pub fn today() -> Self {
    Self::new(Local::now().date_naive())
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.date
  }

  /// Moves by whole months. The day of month is clamped to the last
  /// day of the target month, so Jan 31 + 1 lands on Feb 28 or 29.
  pub fn advance_month(
    &mut self,
    delta: i32
  ) -> Result<(), CursorError> {
    let months =
      Months::new(delta.unsigned_abs());
    let moved = if delta >= 0 {
      self.date.checked_add_months(months)
    } else {
      self.date.checked_sub_months(months)
    };
    self.date = moved.ok_or(
      CursorError::OutOfRange {
        from:  self.date,
        delta: i64::from(delta),
        unit:  "months"
      }
    )?;
    trace!(date = %self.date, delta, "cursor moved by months");
    Ok(())
  }

  pub fn advance_day(
    &mut self,
    delta: i64
  ) -> Result<(), CursorError> {
    self.date =
      shift_days(self.date, delta)
        .ok_or(CursorError::OutOfRange {
          from: self.date,
          delta,
          unit: "days"
        })?;
    trace!(date = %self.date, delta, "cursor moved by days");
    Ok(())
  }

  /// Sets the day of month leniently: out-of-range values roll into
  /// the neighbouring months (32 in January is Feb 1, 0 is the last
  /// day of the previous month).
  pub fn set_day(
    &mut self,
    day: i64
  ) -> Result<(), CursorError> {
    let first = first_of_month(self.date);
    self.date =
      shift_days(first, day.saturating_sub(1)).ok_or(
        CursorError::OutOfRange {
          from:  self.date,
          delta: day,
          unit:  "day-of-month"
        }
      )?;
    Ok(())
  }

  pub fn set_date(
    &mut self,
    date: NaiveDate
  ) {
    self.date = date;
  }

  pub fn reset_to_today(&mut self) {
    self.date = Local::now().date_naive();
  }
}

fn shift_days(
  date: NaiveDate,
  delta: i64
) -> Option<NaiveDate> {
  Duration::try_days(delta).and_then(
    |span| date.checked_add_signed(span)
  )
}

fn first_of_month(
  date: NaiveDate
) -> NaiveDate {
  date
    .with_day(1)
    .unwrap_or(date)
}

/// Week of month with Sunday-start weeks, where week 1 is whichever
/// week holds the 1st.
#[must_use]
pub fn week_of_month(
  date: NaiveDate
) -> u32 {
  let lead = first_of_month(date)
    .weekday()
    .num_days_from_sunday();
  (date.day() - 1 + lead) / 7 + 1
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    DateCursor,
    week_of_month
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn month_step_clamps_to_month_end() {
    let mut cursor =
      DateCursor::new(day(2024, 1, 31));
    cursor
      .advance_month(1)
      .expect("in range");
    assert_eq!(
      cursor.date(),
      day(2024, 2, 29)
    );

    let mut cursor =
      DateCursor::new(day(2023, 1, 31));
    cursor
      .advance_month(1)
      .expect("in range");
    assert_eq!(
      cursor.date(),
      day(2023, 2, 28)
    );

    cursor
      .advance_month(-2)
      .expect("in range");
    assert_eq!(
      cursor.date(),
      day(2022, 12, 28)
    );
  }

  #[test]
  fn day_step_rolls_over_year() {
    let mut cursor =
      DateCursor::new(day(2023, 12, 31));
    cursor
      .advance_day(1)
      .expect("in range");
    assert_eq!(
      cursor.date(),
      day(2024, 1, 1)
    );
    cursor
      .advance_day(-366)
      .expect("in range");
    assert_eq!(
      cursor.date(),
      day(2022, 12, 31)
    );
  }

  #[test]
  fn set_day_is_lenient() {
    let mut cursor =
      DateCursor::new(day(2024, 1, 15));
    cursor.set_day(32).expect("in range");
    assert_eq!(
      cursor.date(),
      day(2024, 2, 1)
    );

    cursor.set_day(0).expect("in range");
    assert_eq!(
      cursor.date(),
      day(2024, 1, 31)
    );

    cursor.set_day(10).expect("in range");
    assert_eq!(
      cursor.date(),
      day(2024, 1, 10)
    );
  }

  #[test]
  fn out_of_range_leaves_cursor_alone() {
    let start = NaiveDate::MAX;
    let mut cursor =
      DateCursor::new(start);
    assert!(cursor.advance_day(1).is_err());
    assert!(
      cursor.advance_month(1).is_err()
    );
    assert_eq!(cursor.date(), start);
  }

  #[test]
  fn weeks_start_on_sunday() {
    // February 2024 opens on a Thursday.
    assert_eq!(
      week_of_month(day(2024, 2, 1)),
      1
    );
    assert_eq!(
      week_of_month(day(2024, 2, 3)),
      1
    );
    assert_eq!(
      week_of_month(day(2024, 2, 4)),
      2
    );
    assert_eq!(
      week_of_month(day(2024, 2, 29)),
      5
    );
    // September 2024 opens on a Sunday.
    assert_eq!(
      week_of_month(day(2024, 9, 7)),
      1
    );
    assert_eq!(
      week_of_month(day(2024, 9, 8)),
      2
    );
  }
}
