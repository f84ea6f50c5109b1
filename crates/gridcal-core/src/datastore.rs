use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::CalendarEvent;

/// Snapshots kept in `undo.data` unless `undo.depth` says otherwise.
pub const DEFAULT_UNDO_DEPTH: usize = 50;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
    pub undo_path: PathBuf,
    pub undo_depth: usize,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        let undo_path = data_dir.join("undo.data");

        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }
        if !undo_path.exists() {
            fs::write(&undo_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            undo = %undo_path.display(),
            "opened event store"
        );

        Ok(Self {
            data_dir,
            events_path,
            undo_path,
            undo_depth: DEFAULT_UNDO_DEPTH,
        })
    }

    /// A depth of zero disables undo history.
    #[must_use]
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<CalendarEvent>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let mut sorted = events.to_vec();
        sorted.sort_by_key(|event| (event.starts_at(), event.created));
        save_jsonl_atomic(&self.events_path, &sorted).context("failed to save events.data")
    }

    #[tracing::instrument(skip(self, event), fields(id = %event.id, date = %event.date))]
    pub fn add_event(&self, event: CalendarEvent) -> anyhow::Result<CalendarEvent> {
        let mut events = self.load_events()?;
        self.push_undo_snapshot(&events)?;
        events.push(event.clone());
        self.save_events(&events)?;
        Ok(event)
    }

    /// Resolves a full uuid or a unique prefix of its simple form.
    #[tracing::instrument(skip(self))]
    pub fn find_event(&self, key: &str) -> anyhow::Result<CalendarEvent> {
        let events = self.load_events()?;
        let needle = key.trim().to_ascii_lowercase().replace('-', "");
        if needle.is_empty() {
            return Err(anyhow!("event id cannot be empty"));
        }

        let mut matches = events
            .into_iter()
            .filter(|event| event.id.simple().to_string().starts_with(&needle));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no event matches id: {key}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("event id is ambiguous: {key}"));
        }
        Ok(first)
    }

    /// Stores `event` over the record with the same id.
    #[tracing::instrument(skip(self, event), fields(id = %event.id))]
    pub fn update_event(&self, event: &CalendarEvent) -> anyhow::Result<()> {
        let mut events = self.load_events()?;
        let idx = events
            .iter()
            .position(|existing| existing.id == event.id)
            .ok_or_else(|| anyhow!("event not found: {}", event.id))?;

        self.push_undo_snapshot(&events)?;
        events[idx] = event.clone();
        self.save_events(&events)
    }

    #[tracing::instrument(skip(self, now), fields(id = %id, date = %date))]
    pub fn move_event(
        &self,
        id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> anyhow::Result<CalendarEvent> {
        let mut events = self.load_events()?;
        let idx = events
            .iter()
            .position(|event| event.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;

        if events[idx].date == date {
            debug!("event already on target date");
            return Ok(events[idx].clone());
        }

        self.push_undo_snapshot(&events)?;
        let from = events[idx].date;
        events[idx].reschedule(date, now);
        let moved = events[idx].clone();
        self.save_events(&events)?;

        info!(%from, to = %date, "moved event");
        Ok(moved)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_event(&self, id: Uuid) -> anyhow::Result<CalendarEvent> {
        let mut events = self.load_events()?;
        let idx = events
            .iter()
            .position(|event| event.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;

        self.push_undo_snapshot(&events)?;
        let removed = events.remove(idx);
        self.save_events(&events)?;
        Ok(removed)
    }

    /// Events dated within `start..=end`, in start order.
    #[tracing::instrument(skip(self))]
    pub fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        let mut events: Vec<CalendarEvent> = self
            .load_events()?
            .into_iter()
            .filter(|event| event.date >= start && event.date <= end)
            .collect();
        events.sort_by_key(|event| event.starts_at());
        debug!(count = events.len(), "selected events in range");
        Ok(events)
    }

    #[tracing::instrument(skip(self, events))]
    pub fn push_undo_snapshot(&self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let mut entries: Vec<Vec<CalendarEvent>> = load_jsonl(&self.undo_path)?;
        entries.push(events.to_vec());
        let excess = entries.len().saturating_sub(self.undo_depth);
        if excess > 0 {
            debug!(dropped = excess, depth = self.undo_depth, "trimming undo history");
            entries.drain(..excess);
        }
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn pop_undo_snapshot(&self) -> anyhow::Result<Option<Vec<CalendarEvent>>> {
        let mut entries: Vec<Vec<CalendarEvent>> = load_jsonl(&self.undo_path)?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(Some(entry))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
