use std::{
  fs,
  io::Error as IOError,
  path::Path,
};

use the_lib::config::Config;
use thiserror::Error;
use toml::{
  Value,
  de::Error as TomlError,
};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("bad config: {0}")]
  BadConfig(#[from] TomlError),
  #[error("failed to read config: {0}")]
  Error(#[from] IOError),
  #[error("failed to encode defaults: {0}")]
  Defaults(#[from] toml::ser::Error),
}

/// Load settings: the preset first, then the file's keys on top of it.
pub fn load(path: Option<&Path>, compact: bool) -> Result<Config, ConfigLoadError> {
  let base = if compact {
    Config::compact()
  } else {
    Config::default()
  };
  match path {
    Some(path) => parse(&fs::read_to_string(path)?, base),
    None => Ok(base),
  }
}

fn parse(text: &str, base: Config) -> Result<Config, ConfigLoadError> {
  let file = Value::Table(text.parse::<toml::Table>()?);
  // Unknown keys are checked against the file alone.
  let _: Config = file.clone().try_into()?;
  let base = Value::try_from(base)?;
  Ok(merge_toml_values(base, file, 2).try_into()?)
}

/// Merge `right` into `left`. Tables are merged key by key down to
/// `merge_depth`; below that, and for every other kind of value, `right`
/// wins.
pub fn merge_toml_values(left: Value, right: Value, merge_depth: usize) -> Value {
  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (name, rvalue) in right_map {
        let merged = match left_map.remove(&name) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(name, merged);
      }
      Value::Table(left_map)
    },
    (_, value) => value,
  }
}
