use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{add_days, parse_date_expr, parse_time_expr, project_today};
use crate::drag::{GridRect, Pointer, apply_drop};
use crate::event::{CalendarEvent, EventTheme};
use crate::grid::{CONSECUTIVE_CELLS, DisplayMode, GridGeometry, MonthLayout, map_point};
use crate::render::Renderer;

const MOD_KEYS: [&str; 11] = [
    "date", "time", "theme", "title", "x", "y", "width", "height", "left", "top", "mode",
];

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "month",
        "window",
        "edit",
        "delete",
        "drop",
        "map",
        "undo",
        "themes",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Positional words plus `key:value` modifiers for the keys in `MOD_KEYS`.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    words: Vec<String>,
    mods: BTreeMap<&'static str, String>,
}

impl Args {
    fn parse(raw: &[String]) -> Self {
        let mut args = Args::default();
        for token in raw {
            let modifier = token.split_once(':').and_then(|(key, value)| {
                MOD_KEYS
                    .iter()
                    .find(|known| known.eq_ignore_ascii_case(key))
                    .map(|known| (*known, value.to_string()))
            });
            match modifier {
                Some((key, value)) => {
                    args.mods.insert(key, value);
                }
                None => args.words.push(token.clone()),
            }
        }
        args
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.mods.get(key).map(String::as_str)
    }

    fn pixel(&self, key: &str) -> anyhow::Result<Option<f64>> {
        self.get(key)
            .map(|raw| parse_pixel(key, raw))
            .transpose()
    }

    fn required_pixel(&self, key: &str) -> anyhow::Result<f64> {
        self.pixel(key)?
            .ok_or_else(|| anyhow!("missing {key}:<pixels>"))
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let today = project_today();
    let command = inv.command.as_str();
    let args = Args::parse(&inv.command_args);

    debug!(command, args = ?inv.command_args, %today, "dispatching command");

    match command {
        "add" => cmd_add(store, renderer, &args, today, now),
        "list" => cmd_list(store, renderer, &args, today),
        "month" => cmd_month(store, renderer, &args, today),
        "window" => cmd_window(store, renderer, &args, today),
        "edit" => cmd_edit(store, renderer, &args, today, now),
        "delete" => cmd_delete(store, &args),
        "drop" => cmd_drop(store, cfg, &args, today, now),
        "map" => cmd_map(cfg, &args, today),
        "undo" => cmd_undo(store),
        "themes" => renderer.print_themes(),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, renderer, args, now))]
fn cmd_add(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &Args,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (date_word, title_words) = args
        .words
        .split_first()
        .ok_or_else(|| anyhow!("usage: add <date> <title...> [theme:<key>] [time:HH:MM]"))?;
    let date = parse_date_expr(date_word, today)?;

    let title = args
        .get("title")
        .map(str::to_string)
        .unwrap_or_else(|| title_words.join(" "));
    if title.trim().is_empty() {
        return Err(anyhow!("event title cannot be empty"));
    }

    let mut event = CalendarEvent::new(title.trim().to_string(), date, now);
    if let Some(raw) = args.get("theme") {
        event.theme = parse_theme(raw)?;
    }
    if let Some(raw) = args.get("time") {
        event.time = Some(parse_time_expr(raw)?);
    }

    let event = store.add_event(event)?;
    info!(id = %event.id, date = %event.date, "added event");
    println!("Created event {}.", event.short_id());
    renderer.print_event_table(&[event])
}

#[instrument(skip(store, renderer, args))]
fn cmd_list(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &Args,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let events = match args.words.first() {
        Some(word) => {
            let layout = MonthLayout::for_date(parse_date_expr(word, today)?);
            store.events_between(layout.first, layout.last())?
        }
        None => {
            let mut events = store.load_events()?;
            events.sort_by_key(|event| event.starts_at());
            events
        }
    };
    renderer.print_event_table(&events)
}

#[instrument(skip(store, renderer, args))]
fn cmd_month(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &Args,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let reference = reference_date(args, today)?;
    let layout = MonthLayout::for_date(reference);
    let events = store.events_between(layout.first, layout.last())?;
    renderer.print_month(reference, &events)
}

#[instrument(skip(store, renderer, args))]
fn cmd_window(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &Args,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let reference = reference_date(args, today)?;
    let anchor = DisplayMode::Consecutive.anchor(reference);
    let last = add_days(anchor, i64::from(CONSECUTIVE_CELLS) - 1);
    let events = store.events_between(anchor, last)?;
    renderer.print_window(anchor, &events)
}

#[instrument(skip(store, renderer, args, now))]
fn cmd_edit(
    store: &mut DataStore,
    renderer: &mut Renderer,
    args: &Args,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let id = args
        .words
        .first()
        .ok_or_else(|| anyhow!("usage: edit <id> [date:..] [time:..] [theme:..] [title:..]"))?;
    let mut event = store.find_event(id)?;
    let before = event.clone();

    if let Some(raw) = args.get("date") {
        event.date = parse_date_expr(raw, today)?;
    }
    if let Some(raw) = args.get("time") {
        event.time = if raw.trim().is_empty() {
            None
        } else {
            Some(parse_time_expr(raw)?)
        };
    }
    if let Some(raw) = args.get("theme") {
        event.theme = parse_theme(raw)?;
    }
    if let Some(raw) = args.get("title") {
        if raw.trim().is_empty() {
            return Err(anyhow!("event title cannot be empty"));
        }
        event.title = raw.trim().to_string();
    }

    if event == before {
        println!("Nothing to change for event {}.", event.short_id());
        return Ok(());
    }

    event.modified = now;
    store.update_event(&event)?;
    println!("Updated event {}.", event.short_id());
    renderer.print_event_table(&[event])
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut DataStore, args: &Args) -> anyhow::Result<()> {
    let id = args
        .words
        .first()
        .ok_or_else(|| anyhow!("usage: delete <id>"))?;
    let event = store.find_event(id)?;
    let removed = store.delete_event(event.id)?;
    println!("Deleted event {} ({}).", removed.short_id(), removed.title);
    Ok(())
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_drop(
    store: &mut DataStore,
    cfg: &Config,
    args: &Args,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let id = args.words.first().ok_or_else(|| {
        anyhow!("usage: drop <id> x:<px> y:<px> width:<px> height:<px> [left:<px>] [top:<px>] [mode:..] [date:..]")
    })?;
    let event = store.find_event(id)?;

    let rect = GridRect::new(
        args.pixel("left")?.unwrap_or(0.0),
        args.pixel("top")?.unwrap_or(0.0),
        args.required_pixel("width")?,
        args.required_pixel("height")?,
    );
    let pointer = Pointer {
        x: args.required_pixel("x")?,
        y: args.required_pixel("y")?,
    };
    let mode = resolve_mode(cfg, args.get("mode"))?;
    let reference = match args.get("date") {
        Some(raw) => parse_date_expr(raw, today)?,
        None => today,
    };

    match apply_drop(store, event.id, rect, pointer, mode, reference, now)? {
        Some(moved) => {
            println!(
                "Moved event {} from {} to {}.",
                moved.short_id(),
                event.date.format("%Y-%m-%d"),
                moved.date.format("%Y-%m-%d")
            );
        }
        None => {
            println!("Drop ignored: the grid has no size yet.");
        }
    }
    Ok(())
}

/// `map <x> <y> <width> <height> [mode] [date]`
#[instrument(skip(cfg, args))]
fn cmd_map(cfg: &Config, args: &Args, today: NaiveDate) -> anyhow::Result<()> {
    let [x, y, width, height, rest @ ..] = args.words.as_slice() else {
        return Err(anyhow!("usage: map <x> <y> <width> <height> [mode] [date]"));
    };

    let mode = resolve_mode(cfg, rest.first().map(String::as_str))?;
    let reference = match rest.get(1) {
        Some(raw) => parse_date_expr(raw, today)?,
        None => today,
    };

    let geometry = GridGeometry::new(parse_pixel("width", width)?, parse_pixel("height", height)?);
    let date = map_point(
        mode,
        parse_pixel("x", x)?,
        parse_pixel("y", y)?,
        geometry,
        reference,
    )?;
    println!("{}", date.format("%Y-%m-%d"));
    Ok(())
}

#[instrument(skip(store))]
fn cmd_undo(store: &mut DataStore) -> anyhow::Result<()> {
    let Some(events) = store.pop_undo_snapshot()? else {
        println!("Nothing to undo.");
        return Ok(());
    };
    store.save_events(&events)?;
    println!("Restored {} event(s).", events.len());
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: add, list, month, window, edit, delete, drop, map, undo, themes, _show, version"
    );
    println!("Modifiers: date: time: theme: title: x: y: width: height: left: top: mode:");
    Ok(())
}

fn reference_date(args: &Args, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    match args.words.first() {
        Some(word) => parse_date_expr(word, today),
        None => Ok(today),
    }
}

fn resolve_mode(cfg: &Config, raw: Option<&str>) -> anyhow::Result<DisplayMode> {
    match raw {
        Some(raw) => DisplayMode::from_key(raw)
            .ok_or_else(|| anyhow!("unknown display mode: {raw} (expected monthly or consecutive)")),
        None => cfg.default_mode(),
    }
}

fn parse_theme(raw: &str) -> anyhow::Result<EventTheme> {
    EventTheme::from_key(raw).ok_or_else(|| {
        let known = EventTheme::all()
            .iter()
            .map(|theme| theme.as_key())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!("unknown theme: {raw} (expected one of {known})")
    })
}

fn parse_pixel(key: &str, raw: &str) -> anyhow::Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("invalid {key} value: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::{Args, expand_command_abbrev, known_command_names, parse_theme};
    use crate::event::EventTheme;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_words_and_modifiers() {
        let args = Args::parse(&strings(&["2024-06-03", "team", "lunch", "theme:success", "Time:12:30"]));
        assert_eq!(args.words, strings(&["2024-06-03", "team", "lunch"]));
        assert_eq!(args.get("theme"), Some("success"));
        assert_eq!(args.get("time"), Some("12:30"));
    }

    #[test]
    fn unknown_prefixes_stay_in_title() {
        let args = Args::parse(&strings(&["note:", "bring", "cake"]));
        assert_eq!(args.words.len(), 3);
        assert!(args.mods.is_empty());
    }

    #[test]
    fn pixel_modifiers_parse() {
        let args = Args::parse(&strings(&["x:12.5", "width:oops"]));
        assert_eq!(args.pixel("x").expect("x"), Some(12.5));
        assert!(args.required_pixel("width").is_err());
        assert!(args.required_pixel("height").is_err());
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("mon", &known), Some("month"));
        assert_eq!(expand_command_abbrev("ma", &known), Some("map"));
        assert_eq!(expand_command_abbrev("m", &known), None);
    }

    #[test]
    fn theme_errors_list_known_keys() {
        assert_eq!(parse_theme("Danger").expect("theme"), EventTheme::Danger);
        let err = parse_theme("teal").expect_err("unknown theme");
        assert!(err.to_string().contains("primary"));
    }
}
