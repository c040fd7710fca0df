use std::fs;

use anyhow::{
  Context,
  Result,
};

use crate::{
  cli::{
    CliOptions,
    OutputFormat,
  },
  report::Report,
};

mod cli;
mod config;
mod logging;
mod report;
mod runner;
mod script;
mod service;

fn main() -> Result<()> {
  let options = CliOptions::parse()?;
  logging::setup_logging(options.verbosity, options.log_file.as_deref())
    .context("failed to set up logging")?;

  let config = config::load(options.config_file.as_deref(), options.compact)
    .context("failed to load configuration")?;
  log::debug!("loaded config: {config:?}");

  let text = fs::read_to_string(&options.script)
    .with_context(|| format!("failed to read script '{}'", options.script.display()))?;
  let script = script::parse(&text)
    .with_context(|| format!("failed to parse script '{}'", options.script.display()))?;
  let timeline = script::compile(&script)?;
  log::info!(
    "replaying {} inputs ({} transactions) from '{}'",
    timeline.inputs.len(),
    timeline.transactions().count(),
    options.script.display()
  );

  let run = if options.realtime {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context("failed to start the async runtime")?;
    runtime.block_on(service::run_realtime(config, timeline))
  } else {
    runner::run_virtual(config, timeline)
  };

  let report = Report::new(run, options.diff);
  match options.format {
    OutputFormat::Text => print!("{}", report.to_text()),
    OutputFormat::Json => println!("{}", report.to_json()?),
  }
  Ok(())
}
