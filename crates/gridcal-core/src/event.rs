use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::clock_time_serde;

/// Colour tag of an event. The table below is the only place a theme key
/// is interpreted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventTheme {
    #[default]
    Default,
    Primary,
    Success,
    Warning,
    Danger,
    Info,
}

impl EventTheme {
    pub fn all() -> [Self; 6] {
        [
            Self::Default,
            Self::Primary,
            Self::Success,
            Self::Warning,
            Self::Danger,
            Self::Info,
        ]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Primary => "primary",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Info => "info",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Primary => "Primary",
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
            Self::Info => "Info",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "primary" => Some(Self::Primary),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "danger" => Some(Self::Danger),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// SGR foreground code used by the terminal renderer.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Self::Default => "37",
            Self::Primary => "34",
            Self::Success => "32",
            Self::Warning => "33",
            Self::Danger => "31",
            Self::Info => "36",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: Uuid,

    pub date: NaiveDate,

    #[serde(default, with = "clock_time_serde::option")]
    pub time: Option<NaiveTime>,

    pub title: String,

    #[serde(default)]
    pub theme: EventTheme,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(title: String, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            time: None,
            title,
            theme: EventTheme::Default,
            created: now,
            modified: now,
        }
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// Moves the event to another day, keeping its time of day.
    pub fn reschedule(&mut self, date: NaiveDate, now: DateTime<Utc>) {
        self.date = date;
        self.modified = now;
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}
