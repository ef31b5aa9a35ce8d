pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datekey;
pub mod filter;
pub mod holiday;
pub mod planner;
pub mod render;
pub mod store;
pub mod task;
pub mod transfer;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    offline = cli.offline,
    "starting dayplan"
  );

  let cfg = config::Config::load(
    cli.config.as_deref()
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let loaded = store.load()?;
  let mut planner =
    planner::Planner::new(
      loaded.clone(),
      cfg.week_start()
    );

  let renderer =
    render::Renderer::new(&cfg);
  let session = commands::Session {
    cfg:      &cfg,
    renderer: &renderer,
    offline:  cli.offline
  };

  commands::dispatch(
    &mut planner,
    &session,
    cli.command
  )?;

  let state = planner.snapshot();
  if state != loaded {
    store.save(&state)?;
  } else {
    debug!("planner unchanged; not saving");
  }

  info!("done");
  Ok(())
}
