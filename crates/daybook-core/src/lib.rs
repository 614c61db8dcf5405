pub mod cli;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod datetime;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod render;
pub mod session;
pub mod store;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::{
  CursorError,
  EventError,
  ImportError,
  StoreError
};
pub use event::Event;
pub use recurrence::ImportReport;
pub use session::Session;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting daybook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.daybookrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let today = Local::now().date_naive();
  let start_expr = cli
    .date
    .or_else(|| cfg.get("cursor.date"))
    .unwrap_or_else(|| {
      "today".to_string()
    });
  let start = datetime::parse_date_expr(
    &start_expr,
    today
  )
  .with_context(|| {
    format!(
      "invalid starting date \
       {start_expr:?}"
    )
  })?;

  let mut session = Session::new(start)
    .with_max_scan_days(
      cfg.import_max_days()?
    );
  let renderer =
    render::Renderer::new(&cfg)?;

  for path in &cli.import {
    let report = session
      .import_file(path)
      .with_context(|| {
        format!(
          "failed to import {}",
          path.display()
        )
      })?;
    renderer.print_import_report(
      &path.display().to_string(),
      &report
    )?;
  }

  let inv = cli::Invocation::from_os(
    &cfg, cli.rest
  )?;

  let mut stdout = io::stdout().lock();
  if inv.command == "shell" {
    commands::run_shell(
      &mut session,
      &cfg,
      &renderer,
      io::stdin().lock(),
      today,
      &mut stdout
    )?;
  } else {
    commands::dispatch(
      &mut session,
      &cfg,
      &renderer,
      inv,
      today,
      &mut stdout
    )?;
  }

  info!(
    events = session.store().len(),
    "done"
  );
  Ok(())
}
