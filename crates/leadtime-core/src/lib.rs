pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod render;
pub mod timeline;
pub mod workday;

use std::ffi::OsString;
use std::io;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use calendar::{
  CalendarMonthView,
  Legend,
  classify_day,
  render_months
};
pub use error::{
  TimelineError,
  TimelineResult
};
pub use timeline::{
  MilestoneKind,
  MilestoneWindow,
  Timeline,
  TimelineConfig,
  compute_milestones,
  plan
};
pub use workday::{
  CalendarDate,
  is_workday,
  next_or_same_monday,
  previous_or_same_monday,
  step_back_workdays,
  step_forward_workdays
};

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
    "starting leadtime CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.leadtimerc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let mut out = io::stdout().lock();
  commands::dispatch_now(
    &cfg, &renderer, inv, &mut out
  )?;

  info!("done");
  Ok(())
}
