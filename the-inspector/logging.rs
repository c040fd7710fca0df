use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

/// Route `log` records (and `tracing` events, through its `log` feature) to
/// stderr, and to `log_file` when given.
pub fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let level = match verbosity {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };

  let mut logger = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level)
    .chain(std::io::stderr());

  if let Some(path) = log_file {
    logger = logger.chain(fern::log_file(path)?);
  }

  logger.apply()?;
  Ok(())
}
