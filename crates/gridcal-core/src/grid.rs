//! Pixel-to-date mapping for the calendar grids.
//!
//! Two layouts are supported. The monthly grid is seven Monday-first
//! columns with blank cells ahead of day 1; the consecutive window is a
//! fixed 7x5 block of days starting on a week-aligned Monday.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::{
    WEEK_START, add_days, days_in_month, start_of_month, start_of_week, week_align,
};

pub const DAYS_PER_WEEK: u32 = 7;
pub const CONSECUTIVE_ROWS: u32 = 5;
pub const CONSECUTIVE_CELLS: u32 = DAYS_PER_WEEK * CONSECUTIVE_ROWS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Monthly,
    Consecutive,
}

impl DisplayMode {
    pub fn all() -> [Self; 2] {
        [Self::Monthly, Self::Consecutive]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Consecutive => "consecutive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Month",
            Self::Consecutive => "30 days",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Some(Self::Monthly),
            "consecutive" | "window" => Some(Self::Consecutive),
            _ => None,
        }
    }

    /// First date the grid for `reference` is laid out from.
    ///
    /// Monthly grids start at the first of the month. Consecutive windows
    /// always start on the Monday of the reference week, for rendering and
    /// for drops alike.
    pub fn anchor(self, reference: NaiveDate) -> NaiveDate {
        match self {
            Self::Monthly => start_of_month(reference),
            Self::Consecutive => week_align(reference),
        }
    }
}

/// Rendered size of the grid container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub width: f64,
    pub height: f64,
}

impl GridGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A grid that has not been laid out yet reports a zero size.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GridError {
    #[error("calendar grid has no usable size ({width}x{height}); it must be measured after layout")]
    EmptyGrid { width: f64, height: f64 },
}

/// Cell arrangement of one month in the Monday-first grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthLayout {
    pub first: NaiveDate,
    pub total_days: u32,
    pub leading_offset: u32,
    pub weeks: u32,
}

impl MonthLayout {
    pub fn for_date(reference: NaiveDate) -> Self {
        let first = start_of_month(reference);
        let total_days = days_in_month(first.year(), first.month());
        let leading_offset = leading_offset(first);
        let weeks = (total_days + leading_offset).div_ceil(DAYS_PER_WEEK);

        Self {
            first,
            total_days,
            leading_offset,
            weeks,
        }
    }

    pub fn last(&self) -> NaiveDate {
        add_days(self.first, i64::from(self.total_days) - 1)
    }

    /// Blank cells drawn before day 1, measured as the distance back to
    /// the start of the week. Must agree with `leading_offset`.
    pub fn leading_blank_cells(&self) -> u32 {
        let week_start = start_of_week(self.first, WEEK_START);
        (self.first - week_start).num_days().unsigned_abs() as u32
    }

    /// 1-based day of month for a cell; values outside `1..=total_days`
    /// fall before or after the month.
    pub fn day_index(&self, row: u32, col: u32) -> i64 {
        i64::from(row) * i64::from(DAYS_PER_WEEK) + i64::from(col)
            - i64::from(self.leading_offset)
            + 1
    }

    pub fn date_for_index(&self, day_index: i64) -> NaiveDate {
        let total = i64::from(self.total_days);
        if day_index <= 0 {
            add_days(self.first, day_index)
        } else if day_index > total {
            add_days(self.last(), day_index - total)
        } else {
            add_days(self.first, day_index - 1)
        }
    }

    /// `(row, col)` of a day of this month, if the day exists.
    pub fn cell_of_day(&self, day: u32) -> Option<(u32, u32)> {
        if day == 0 || day > self.total_days {
            return None;
        }
        let idx = self.leading_offset + day - 1;
        Some((idx / DAYS_PER_WEEK, idx % DAYS_PER_WEEK))
    }
}

/// Monday-first column of the first day of a month (Monday = 0).
pub fn leading_offset(first: NaiveDate) -> u32 {
    (first.weekday().num_days_from_sunday() + 6) % DAYS_PER_WEEK
}

pub fn map_monthly_point(x: f64, y: f64, width: f64, height: f64, reference: NaiveDate) -> NaiveDate {
    let layout = MonthLayout::for_date(reference);
    let (row, col) = monthly_cell_of(x, y, GridGeometry::new(width, height), &layout);
    layout.date_for_index(layout.day_index(row, col))
}

pub fn map_consecutive_point(x: f64, y: f64, width: f64, height: f64, start: NaiveDate) -> NaiveDate {
    let (row, col) = consecutive_cell_of(x, y, GridGeometry::new(width, height));
    add_days(start, i64::from(row * DAYS_PER_WEEK + col))
}

/// Maps a point inside the grid to a date for the given display mode.
///
/// `reference` is any date inside the displayed period; the grid anchor is
/// derived from it with [`DisplayMode::anchor`]. Non-finite coordinates
/// resolve to `reference` unchanged.
#[tracing::instrument(level = "debug", skip(geometry), fields(width = geometry.width, height = geometry.height))]
pub fn map_point(
    mode: DisplayMode,
    x: f64,
    y: f64,
    geometry: GridGeometry,
    reference: NaiveDate,
) -> Result<NaiveDate, GridError> {
    if !geometry.is_usable() {
        return Err(GridError::EmptyGrid {
            width: geometry.width,
            height: geometry.height,
        });
    }

    if !x.is_finite() || !y.is_finite() {
        warn!(x, y, %reference, "non-finite drop coordinates; keeping reference date");
        return Ok(reference);
    }

    let anchor = mode.anchor(reference);
    let date = match mode {
        DisplayMode::Monthly => map_monthly_point(x, y, geometry.width, geometry.height, anchor),
        DisplayMode::Consecutive => {
            map_consecutive_point(x, y, geometry.width, geometry.height, anchor)
        }
    };

    debug!(mode = mode.as_key(), %anchor, %date, "mapped grid point");
    Ok(date)
}

pub fn monthly_cell_of(x: f64, y: f64, geometry: GridGeometry, layout: &MonthLayout) -> (u32, u32) {
    let x = clamp_axis(x, geometry.width);
    let y = clamp_axis(y, geometry.height);
    let day_width = geometry.width / f64::from(DAYS_PER_WEEK);
    let week_height = geometry.height / f64::from(layout.weeks);

    let col = cell_index(x / day_width, DAYS_PER_WEEK);
    let row = cell_index(y / week_height, layout.weeks);
    (row, col)
}

pub fn consecutive_cell_of(x: f64, y: f64, geometry: GridGeometry) -> (u32, u32) {
    // one pixel inside the far edge so floor() cannot spill a column
    let x = clamp_axis(x, geometry.width - 1.0);
    let y = clamp_axis(y, geometry.height - 1.0);
    let day_width = geometry.width / f64::from(DAYS_PER_WEEK);
    let day_height = geometry.height / f64::from(CONSECUTIVE_ROWS);

    let col = cell_index(x / day_width, DAYS_PER_WEEK);
    let row = cell_index(y / day_height, CONSECUTIVE_ROWS);
    (row, col)
}

pub fn monthly_cell_center(row: u32, col: u32, geometry: GridGeometry, layout: &MonthLayout) -> (f64, f64) {
    let day_width = geometry.width / f64::from(DAYS_PER_WEEK);
    let week_height = geometry.height / f64::from(layout.weeks);
    (
        (f64::from(col) + 0.5) * day_width,
        (f64::from(row) + 0.5) * week_height,
    )
}

pub fn consecutive_cell_center(row: u32, col: u32, geometry: GridGeometry) -> (f64, f64) {
    let day_width = geometry.width / f64::from(DAYS_PER_WEEK);
    let day_height = geometry.height / f64::from(CONSECUTIVE_ROWS);
    (
        (f64::from(col) + 0.5) * day_width,
        (f64::from(row) + 0.5) * day_height,
    )
}

// f64::clamp panics on inverted bounds, so clamp by hand; NaN lands on 0.
fn clamp_axis(value: f64, upper: f64) -> f64 {
    value.max(0.0).min(upper.max(0.0))
}

fn cell_index(ratio: f64, count: u32) -> u32 {
    let floored = ratio.floor();
    if floored.is_nan() || floored < 0.0 {
        return 0;
    }
    (floored as u32).min(count.saturating_sub(1))
}
