//! Tunables of the inspector.
//!
//! All types deserialize from kebab-case keys and reject unknown fields.
//! Missing keys fall back to the defaults of the full visualizer view; the
//! compact flow view is available as [`Config::compact`].

use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  coalesce::DEFAULT_QUIET,
  history::{
    COMPACT_CAPACITY,
    DEFAULT_CAPACITY,
    Order,
  },
  lifecycle::{
    DEFAULT_RESTART_DELAY,
    LifecycleStep,
    default_steps,
  },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct InspectorConfig {
  /// Maximum number of records kept in the log.
  pub capacity:    usize,
  /// Quiet period before queued records are flushed.
  pub debounce_ms: u64,
  /// Display order of the log.
  pub order:       Order,
}

impl Default for InspectorConfig {
  fn default() -> Self {
    Self {
      capacity:    DEFAULT_CAPACITY,
      debounce_ms: DEFAULT_QUIET.as_millis() as u64,
      order:       Order::NewestFirst,
    }
  }
}

impl InspectorConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LifecycleConfig {
  pub enabled:             bool,
  pub restart_debounce_ms: u64,
  pub steps:               Vec<LifecycleStep>,
}

impl Default for LifecycleConfig {
  fn default() -> Self {
    Self {
      enabled:             true,
      restart_debounce_ms: DEFAULT_RESTART_DELAY.as_millis() as u64,
      steps:               default_steps(),
    }
  }
}

impl LifecycleConfig {
  pub fn restart_delay(&self) -> Duration {
    Duration::from_millis(self.restart_debounce_ms)
  }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
  pub inspector: InspectorConfig,
  pub lifecycle: LifecycleConfig,
}

impl Config {
  /// Settings of the compact flow view: a short log, oldest first.
  pub fn compact() -> Self {
    Self {
      inspector: InspectorConfig {
        capacity: COMPACT_CAPACITY,
        order: Order::OldestFirst,
        ..InspectorConfig::default()
      },
      lifecycle: LifecycleConfig::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_the_full_view() {
    let config = Config::default();
    assert_eq!(config.inspector.capacity, 60);
    assert_eq!(config.inspector.debounce(), Duration::from_millis(500));
    assert_eq!(config.lifecycle.restart_delay(), Duration::from_millis(800));
    assert_eq!(config.lifecycle.steps.len(), 4);
    assert!(config.lifecycle.enabled);
  }

  #[test]
  fn compact_preset() {
    let config = Config::compact();
    assert_eq!(config.inspector.capacity, 10);
    assert_eq!(config.inspector.order, Order::OldestFirst);
  }

  #[test]
  fn deserializes_partial_json() {
    let config: Config = serde_json::from_value(serde_json::json!({
      "inspector": {"capacity": 5},
      "lifecycle": {"steps": [{"id": "a", "label": "A", "hold-ms": 10}]},
    }))
    .unwrap();
    assert_eq!(config.inspector.capacity, 5);
    assert_eq!(config.inspector.debounce_ms, 500);
    assert_eq!(config.lifecycle.steps[0].hold(), Duration::from_millis(10));
  }

  #[test]
  fn rejects_unknown_keys() {
    let err = serde_json::from_value::<Config>(serde_json::json!({
      "inspector": {"capcity": 5},
    }));
    assert!(err.is_err());
  }
}
