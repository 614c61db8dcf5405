use chrono::{Datelike, NaiveDate};
use tracing::{debug, instrument};

use crate::cursor::{DateCursor, week_of_month};
use crate::error::StoreError;
use crate::event::Event;

/// Insertion-ordered events with no two conflicting entries.
///
/// The invariant is checked on every write path (`add`, `replace`);
/// events are immutable so nothing can break it from outside.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Position of an event borrowed out of this store.
    pub fn index_of(&self, event: &Event) -> Option<usize> {
        self.events.iter().position(|e| std::ptr::eq(e, event))
    }

    /// Appends `event` unless it conflicts with something already
    /// stored. Returns whether it was inserted.
    #[instrument(skip(self, event), fields(name = %event.name(), date = %event.date()))]
    pub fn add(&mut self, event: Event) -> bool {
        if let Some(existing) = self.first_conflict(&event, None) {
            debug!(%existing, "rejected conflicting event");
            return false;
        }
        self.events.push(event);
        debug!(count = self.events.len(), "event added");
        true
    }

    /// Swaps the event at `index` for `event`, keeping its position.
    /// The replacement is only checked against the other events, so an
    /// event may be moved onto a slot overlapping its old one.
    #[instrument(skip(self, event), fields(name = %event.name(), date = %event.date()))]
    pub fn replace(&mut self, index: usize, event: Event) -> Result<bool, StoreError> {
        self.check_index(index)?;
        if let Some(existing) = self.first_conflict(&event, Some(index)) {
            debug!(%existing, "rejected conflicting replacement");
            return Ok(false);
        }
        self.events[index] = event;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, index: usize) -> Result<Event, StoreError> {
        self.check_index(index)?;
        let removed = self.events.remove(index);
        debug!(event = %removed, "event removed");
        Ok(removed)
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index >= self.events.len() {
            return Err(StoreError::NoSuchEvent {
                index,
                len: self.events.len(),
            });
        }
        Ok(())
    }

    fn first_conflict(&self, candidate: &Event, skip: Option<usize>) -> Option<&Event> {
        self.events
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .map(|(_, e)| e)
            .find(|e| e.conflicts(candidate))
    }

    fn select<F>(&self, keep: F) -> Vec<&Event>
    where
        F: Fn(NaiveDate) -> bool,
    {
        self.events.iter().filter(|e| keep(e.date())).collect()
    }

    #[instrument(skip(self))]
    pub fn day_events(&self, cursor: &DateCursor) -> Vec<&Event> {
        let today = cursor.date();
        self.select(|date| date == today)
    }

    /// Events in the cursor's Sunday-start week, limited to the
    /// cursor's month.
    #[instrument(skip(self))]
    pub fn week_events(&self, cursor: &DateCursor) -> Vec<&Event> {
        let anchor = cursor.date();
        let week = week_of_month(anchor);
        self.select(|date| same_month(date, anchor) && week_of_month(date) == week)
    }

    #[instrument(skip(self))]
    pub fn month_events(&self, cursor: &DateCursor) -> Vec<&Event> {
        let anchor = cursor.date();
        self.select(|date| same_month(date, anchor))
    }

    /// Events dated `start`, `end`, or strictly between them. With
    /// `start > end` only the two endpoint days can match.
    #[instrument(skip(self))]
    pub fn interval_events(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Event> {
        self.select(|date| date == start || date == end || (start < date && date < end))
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
