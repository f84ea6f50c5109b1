use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::add_days;
use crate::event::{CalendarEvent, EventTheme};
use crate::grid::{CONSECUTIVE_CELLS, DAYS_PER_WEEK, MonthLayout};

const WEEKDAY_LABELS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const CELL_WIDTH: usize = 5;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_month(&mut self, reference: NaiveDate, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_month(out, reference, events)
    }

    /// Month grid with blank cells ahead of day 1, followed by the month's
    /// events.
    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        reference: NaiveDate,
        events: &[CalendarEvent],
    ) -> anyhow::Result<()> {
        let layout = MonthLayout::for_date(reference);
        writeln!(out, "{}", layout.first.format("%B %Y"))?;
        write_weekday_header(&mut out)?;

        let mut cells: Vec<String> = (0..layout.leading_blank_cells())
            .map(|_| " ".repeat(CELL_WIDTH))
            .collect();
        for offset in 0..layout.total_days {
            let day = add_days(layout.first, i64::from(offset));
            cells.push(self.day_cell(day, events));
        }
        write_cell_rows(&mut out, &cells)?;

        writeln!(out)?;
        let month_events: Vec<CalendarEvent> = events
            .iter()
            .filter(|event| event.date >= layout.first && event.date <= layout.last())
            .cloned()
            .collect();
        self.write_event_table(out, &month_events)
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_window(&mut self, anchor: NaiveDate, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_window(out, anchor, events)
    }

    /// Consecutive window: seven columns by five rows from `anchor`.
    pub fn write_window<W: Write>(
        &self,
        mut out: W,
        anchor: NaiveDate,
        events: &[CalendarEvent],
    ) -> anyhow::Result<()> {
        let last = add_days(anchor, i64::from(CONSECUTIVE_CELLS) - 1);
        writeln!(out, "{} .. {}", anchor.format("%Y-%m-%d"), last.format("%Y-%m-%d"))?;
        write_weekday_header(&mut out)?;

        let cells: Vec<String> = (0..CONSECUTIVE_CELLS)
            .map(|offset| self.day_cell(add_days(anchor, i64::from(offset)), events))
            .collect();
        write_cell_rows(&mut out, &cells)?;

        writeln!(out)?;
        let window_events: Vec<CalendarEvent> = events
            .iter()
            .filter(|event| event.date >= anchor && event.date <= last)
            .cloned()
            .collect();
        self.write_event_table(out, &window_events)
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_event_table(&mut self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_table(out, events)
    }

    pub fn write_event_table<W: Write>(&self, mut out: W, events: &[CalendarEvent]) -> anyhow::Result<()> {
        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Time".to_string(),
            "Theme".to_string(),
            "Title".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&event.short_id(), "33"),
                    event.date.format("%Y-%m-%d").to_string(),
                    event
                        .time
                        .map(|time| time.format("%H:%M").to_string())
                        .unwrap_or_default(),
                    self.paint(event.theme.as_key(), event.theme.ansi_code()),
                    event.title.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    pub fn print_themes(&mut self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for theme in EventTheme::all() {
            writeln!(out, "{:<8} {}", theme.as_key(), self.paint(theme.label(), theme.ansi_code()))?;
        }
        Ok(())
    }

    fn day_cell(&self, day: NaiveDate, events: &[CalendarEvent]) -> String {
        let mut on_day = events.iter().filter(|event| event.date == day);
        let Some(first) = on_day.next() else {
            return format!("{:>2}{:<3}", day.day(), "");
        };
        let count = 1 + on_day.count();
        let marker = format!("*{:<2}", count.min(99));
        format!("{:>2}{}", day.day(), self.paint(&marker, first.theme.ansi_code()))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_weekday_header<W: Write>(out: &mut W) -> anyhow::Result<()> {
    let header = WEEKDAY_LABELS
        .iter()
        .map(|label| format!("{label:<width$}", width = CELL_WIDTH))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", header.trim_end())?;
    Ok(())
}

fn write_cell_rows<W: Write>(out: &mut W, cells: &[String]) -> anyhow::Result<()> {
    for row in cells.chunks(DAYS_PER_WEEK as usize) {
        let line = row.join(" ");
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{Renderer, strip_ansi};
    use crate::config::Config;
    use crate::event::CalendarEvent;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn render_plain<F>(f: F) -> Vec<String>
    where
        F: FnOnce(&Renderer, &mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        let renderer = Renderer::new(&cfg).expect("renderer");
        let mut buf = Vec::new();
        f(&renderer, &mut buf).expect("render");
        String::from_utf8(buf)
            .expect("utf8 output")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn month_grid_starts_after_leading_blanks() {
        let events = vec![CalendarEvent::new("planning".to_string(), date(2024, 6, 3), Utc::now())];
        let lines = render_plain(|renderer, buf| renderer.write_month(buf, date(2024, 6, 20), &events));

        assert_eq!(lines[0], "June 2024");
        assert!(lines[1].starts_with("Mo"));
        // five blank cells of five columns plus separators
        assert_eq!(lines[2].find('1'), Some(31));
        assert!(lines[3].starts_with(" 3*1"));
        assert!(lines[6].starts_with("24"));
        assert!(lines[7].is_empty());
        assert!(lines.iter().any(|line| line.contains("planning")));
    }

    #[test]
    fn window_has_five_rows_from_anchor() {
        let lines = render_plain(|renderer, buf| renderer.write_window(buf, date(2024, 6, 3), &[]));

        assert_eq!(lines[0], "2024-06-03 .. 2024-07-07");
        assert!(lines[2].starts_with(" 3"));
        assert!(lines[6].trim_end().ends_with(" 7"));
        assert_eq!(lines[7], "");
        assert_eq!(lines[8], "No events.");
    }

    #[test]
    fn strips_ansi_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn color_setting_uses_config_bool_values() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "maybe".to_string())]);
        assert!(Renderer::new(&cfg).is_err());

        cfg.apply_overrides(vec![("color".to_string(), "y".to_string())]);
        assert!(Renderer::new(&cfg).expect("renderer").color);
    }
}
