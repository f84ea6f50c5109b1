pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod drag;
pub mod event;
pub mod grid;
pub mod render;

use std::ffi::OsString;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::GlobalCli;
use crate::config::Config;
use crate::datastore::DataStore;

/// Entry point shared by the binary
/// and the integration tests.
#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli =
    GlobalCli::parse_from(pre.cleaned_args);
  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  let cfg =
    layered_config(&cli, pre.rc_overrides)?;
  info!(
    timezone = %datetime::project_timezone(),
    mode = cfg.get("default.mode").as_deref().unwrap_or("monthly"),
    "gridcal session"
  );

  let mut store =
    open_store(&cfg, cli.data.as_deref())?;
  let mut renderer =
    render::Renderer::new(&cfg)?;

  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;
  debug!(
    command = %inv.command,
    args = inv.command_args.len(),
    "resolved command"
  );

  commands::dispatch(
    &mut store,
    &cfg,
    &mut renderer,
    inv
  )
}

/// rc file first, then positional
/// `rc.key=value` words, then `--rc`.
fn layered_config(
  cli: &GlobalCli,
  positional: Vec<(String, String)>
) -> anyhow::Result<Config> {
  let mut cfg = Config::load(
    cli.rc_file.as_deref()
  )?;
  let flags = cli
    .rc_overrides
    .iter()
    .map(|kv| {
      (kv.key.clone(), kv.value.clone())
    });
  cfg.apply_overrides(
    positional.into_iter().chain(flags)
  );
  Ok(cfg)
}

fn open_store(
  cfg: &Config,
  data_override: Option<&Path>
) -> anyhow::Result<DataStore> {
  let data_dir =
    config::resolve_data_dir(
      cfg,
      data_override
    )
    .context(
      "failed to resolve data \
       directory"
    )?;
  let depth = cfg.undo_depth()?;

  let store = DataStore::open(&data_dir)
    .with_context(|| {
      format!(
        "failed to open event store at \
         {}",
        data_dir.display()
      )
    })?
    .with_undo_depth(depth);
  debug!(
    undo_depth = depth,
    "event store ready"
  );
  Ok(store)
}
