use std::path::Path;

use chrono::NaiveDate;
use tracing::{
  info,
  instrument,
  warn
};

use crate::cursor::DateCursor;
use crate::error::{
  CursorError,
  EventError,
  ImportError,
  StoreError
};
use crate::event::Event;
use crate::recurrence::{
  self,
  DEFAULT_MAX_SCAN_DAYS,
  ImportReport
};
use crate::store::EventStore;

/// One planning session: the event store plus the date cursor that
/// the relative views read.
///
/// Built once by the entry point and handed by `&mut` to whatever
/// drives it.
#[derive(Debug, Clone)]
pub struct Session {
  cursor:        DateCursor,
  store:         EventStore,
  max_scan_days: usize
}

impl Session {
  pub fn new(start: NaiveDate) -> Self {
    Self {
      cursor:        DateCursor::new(start),
      store:         EventStore::new(),
      max_scan_days: DEFAULT_MAX_SCAN_DAYS
    }
  }

  pub fn starting_today() -> Self {
    Self::new(DateCursor::today().date())
  }

  #[must_use]
  pub fn with_max_scan_days(
    mut self,
    max_scan_days: usize
  ) -> Self {
    self.max_scan_days = max_scan_days;
    self
  }

  pub fn max_scan_days(&self) -> usize {
    self.max_scan_days
  }

  pub fn store(&self) -> &EventStore {
    &self.store
  }

  pub fn cursor(&self) -> &DateCursor {
    &self.cursor
  }

  pub fn current_date(&self) -> NaiveDate {
    self.cursor.date()
  }

  pub fn advance_month(
    &mut self,
    delta: i32
  ) -> Result<(), CursorError> {
    self.cursor.advance_month(delta)
  }

  pub fn advance_day(
    &mut self,
    delta: i64
  ) -> Result<(), CursorError> {
    self.cursor.advance_day(delta)
  }

  pub fn set_day(
    &mut self,
    day: i64
  ) -> Result<(), CursorError> {
    self.cursor.set_day(day)
  }

  pub fn go_to(
    &mut self,
    date: NaiveDate
  ) {
    self.cursor.set_date(date);
  }

  pub fn reset_to_today(&mut self) {
    self.cursor.reset_to_today();
  }

  /// Stores `event` unless it clashes with one already held.
  pub fn add(
    &mut self,
    event: Event
  ) -> bool {
    self.store.add(event)
  }

  /// Builds the event and tries to store it. `Ok(false)` means it
  /// clashed with an existing event.
  pub fn add_event(
    &mut self,
    name: &str,
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8
  ) -> Result<bool, EventError> {
    let event = Event::new(
      name, date, start_hour, end_hour
    )?;
    Ok(self.add(event))
  }

  /// Moves the event at `index` to a new slot, keeping its name and
  /// position. `Ok(false)` leaves it where it was.
  #[instrument(skip(self))]
  pub fn reschedule(
    &mut self,
    index: usize,
    date: NaiveDate,
    start_hour: u8,
    end_hour: u8
  ) -> anyhow::Result<bool> {
    let current = self.store.get(index).ok_or(
      StoreError::NoSuchEvent {
        index,
        len: self.store.len()
      }
    )?;
    let moved = current.rescheduled(
      date, start_hour, end_hour
    )?;
    Ok(self.store.replace(index, moved)?)
  }

  pub fn remove_event(
    &mut self,
    index: usize
  ) -> Result<Event, StoreError> {
    self.store.remove(index)
  }

  pub fn day_events(&self) -> Vec<&Event> {
    self.store.day_events(&self.cursor)
  }

  pub fn week_events(&self) -> Vec<&Event> {
    self.store.week_events(&self.cursor)
  }

  pub fn month_events(
    &self
  ) -> Vec<&Event> {
    self.store.month_events(&self.cursor)
  }

  pub fn interval_events(
    &self,
    start: NaiveDate,
    end: NaiveDate
  ) -> Vec<&Event> {
    self.store.interval_events(start, end)
  }

  #[instrument(skip(self))]
  pub fn import_file(
    &mut self,
    path: &Path
  ) -> Result<ImportReport, ImportError> {
    info!(path = %path.display(), "importing recurring events");
    recurrence::import_file(
      &mut self.store,
      path,
      self.max_scan_days
    )
  }

  /// Pass/fail form of [`Session::import_file`].
  pub fn import_from_file(
    &mut self,
    path: &Path
  ) -> bool {
    match self.import_file(path) {
      | Ok(_) => true,
      | Err(err) => {
        warn!(error = %err, "import failed");
        false
      }
    }
  }
}
