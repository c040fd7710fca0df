use std::{
  fmt,
  path::PathBuf,
};

use anyhow::{
  Result,
  bail,
};
use clap::{
  ArgAction,
  Parser,
  ValueEnum,
};
use the_lib::record::TransactionId;

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub script:      PathBuf,
  pub config_file: Option<PathBuf>,
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub format:      OutputFormat,
  pub realtime:    bool,
  pub compact:     bool,
  pub diff:        Option<TransactionId>,
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }
}

#[derive(Parser, Debug)]
#[command(name = "the-inspector", about, long_about = None, version)]
struct RawCli {
  /// Edit script to replay (TOML)
  #[arg(value_name = "SCRIPT")]
  script: PathBuf,

  /// Load configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE")]
  config_file: Option<PathBuf>,

  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Output format of the report
  #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Replay with real timers instead of a virtual clock
  #[arg(long = "realtime")]
  realtime: bool,

  /// Use the compact view settings (short log, oldest first)
  #[arg(long = "compact")]
  compact: bool,

  /// Print the side-by-side diff of one record
  #[arg(long = "diff", value_name = "ID")]
  diff: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  Text,
  Json,
}

impl fmt::Display for OutputFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text => write!(f, "text"),
      Self::Json => write!(f, "json"),
    }
  }
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    if !raw.script.is_file() {
      bail!("script '{}' does not exist", raw.script.display());
    }

    Ok(Self {
      script:      raw.script,
      config_file: raw.config_file,
      verbosity:   raw.verbosity,
      log_file:    raw.log_file,
      format:      raw.format,
      realtime:    raw.realtime,
      compact:     raw.compact,
      diff:        raw.diff.map(TransactionId::new),
    })
  }
}
