use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::datastore::DataStore;
use crate::event::CalendarEvent;
use crate::grid::{DisplayMode, GridError, GridGeometry, map_point};

/// Bounding box of the rendered grid, in the same coordinate space as the
/// pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl GridRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.width, self.height)
    }

    pub fn local_point(&self, pointer: Pointer) -> (f64, f64) {
        (pointer.x - self.left, pointer.y - self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropOutcome {
    Target(NaiveDate),
    Skipped(GridError),
}

/// Works out which date a drop at `pointer` lands on.
///
/// A grid that has not been laid out is logged and skipped instead of
/// producing a date.
#[instrument(level = "debug")]
pub fn resolve_drop(
    rect: GridRect,
    pointer: Pointer,
    mode: DisplayMode,
    reference: NaiveDate,
) -> DropOutcome {
    let (x, y) = rect.local_point(pointer);
    match map_point(mode, x, y, rect.geometry(), reference) {
        Ok(date) => DropOutcome::Target(date),
        Err(err) => {
            warn!(error = %err, "ignoring drop on unmeasured grid");
            DropOutcome::Skipped(err)
        }
    }
}

/// Resolves a drop and moves the event to the resulting date.
///
/// Returns `None` when the drop was skipped.
#[instrument(skip(store, now), fields(event = %event_id))]
pub fn apply_drop(
    store: &DataStore,
    event_id: Uuid,
    rect: GridRect,
    pointer: Pointer,
    mode: DisplayMode,
    reference: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<CalendarEvent>> {
    let events = store.load_events()?;
    if !events.iter().any(|event| event.id == event_id) {
        return Err(anyhow!("event not found: {event_id}"));
    }

    match resolve_drop(rect, pointer, mode, reference) {
        DropOutcome::Target(date) => {
            debug!(%date, "drop resolved");
            store.move_event(event_id, date, now).map(Some)
        }
        DropOutcome::Skipped(_) => Ok(None),
    }
}
