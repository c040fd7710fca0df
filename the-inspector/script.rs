//! Edit scripts: a document to start from and a list of steps.
//!
//! ```toml
//! initial = "hello"
//!
//! [[step]]
//! type = "select"
//! anchor = 5
//! head = 5
//!
//! [[step]]
//! type = "type"
//! text = " world"
//! delay-ms = 120
//!
//! [[step]]
//! type = "wait"
//! ms = 1000
//! ```
//!
//! Document steps go through the reference engine and become transaction
//! records; the other steps are intents a viewer would issue. [`compile`]
//! turns a script into a [`Timeline`] of inputs at fixed offsets.

use std::time::Duration;

use serde::Deserialize;
use the_document::{
  Applied,
  Document,
  DocumentError,
};
use the_lib::record::{
  RecordBuilder,
  TransactionId,
  TransactionRecord,
};
use thiserror::Error;

/// Delay between typed characters when a `type` step does not set one.
pub const DEFAULT_TYPE_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Script {
  #[serde(default)]
  pub initial: String,
  #[serde(default, rename = "step")]
  pub steps:   Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
  Type {
    text:     String,
    #[serde(default = "default_type_delay", rename = "delay-ms")]
    delay_ms: u64,
  },
  Insert {
    at:   usize,
    text: String,
  },
  Delete {
    from: usize,
    to:   usize,
  },
  Split {
    at: usize,
  },
  Select {
    anchor: usize,
    head:   usize,
  },
  ToggleMark {
    mark: String,
  },
  Undo,
  Redo,
  Meta {
    key: String,
  },
  Wait {
    ms: u64,
  },
  SelectRecord {
    record: RecordRef,
  },
  Replay,
  ToggleAnimation,
  Pause,
  Resume,
  Highlight {
    step: usize,
  },
  Clear,
}

fn default_type_delay() -> u64 {
  DEFAULT_TYPE_DELAY_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
  Id(u64),
  Keyword(RecordKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKeyword {
  Latest,
  Live,
}

/// What a viewer asks of the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
  Select(RecordRef),
  Replay,
  ToggleAnimation,
  Pause,
  Resume,
  Highlight(usize),
  Clear,
}

#[derive(Debug, Clone)]
pub enum Input {
  Transaction(Box<TransactionRecord>),
  Intent(Intent),
}

#[derive(Debug, Clone)]
pub struct TimedInput {
  /// Offset from the start of the run.
  pub at:    Duration,
  pub input: Input,
}

#[derive(Debug, Default, Clone)]
pub struct Timeline {
  pub inputs: Vec<TimedInput>,
  /// Offset of the last step, including trailing waits.
  pub end:    Duration,
}

impl Timeline {
  pub fn transactions(&self) -> impl Iterator<Item = &TransactionRecord> {
    self.inputs.iter().filter_map(|timed| {
      match &timed.input {
        Input::Transaction(record) => Some(record.as_ref()),
        Input::Intent(_) => None,
      }
    })
  }
}

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("invalid script: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("step {index} ({step:?}) failed: {source}")]
  Step {
    index:  usize,
    step:   Step,
    #[source]
    source: DocumentError,
  },
}

pub fn parse(text: &str) -> Result<Script, ScriptError> {
  Ok(toml::from_str(text)?)
}

/// Run the document steps of `script` and lay every input out in time.
/// Steps without an inherent duration take no time.
pub fn compile(script: &Script) -> Result<Timeline, ScriptError> {
  let mut doc = Document::new(&script.initial);
  let mut builder = RecordBuilder::new();
  let mut timeline = Timeline::default();
  let mut now = Duration::ZERO;

  for (index, step) in script.steps.iter().enumerate() {
    let fail = |source| {
      ScriptError::Step {
        index,
        step: step.clone(),
        source,
      }
    };
    let mut push = |at: Duration, applied: &Applied| {
      let record = builder.build(&applied.event());
      timeline.inputs.push(TimedInput {
        at,
        input: Input::Transaction(Box::new(record)),
      });
    };

    match step {
      Step::Type { text, delay_ms } => {
        let delay = Duration::from_millis(*delay_ms);
        for (i, ch) in text.chars().enumerate() {
          if i > 0 {
            now += delay;
          }
          let applied = doc.type_char(ch).map_err(fail)?;
          push(now, &applied);
        }
      },
      Step::Insert { at, text } => push(now, &doc.insert_text(*at, text).map_err(fail)?),
      Step::Delete { from, to } => push(now, &doc.delete(*from, *to).map_err(fail)?),
      Step::Split { at } => push(now, &doc.split_paragraph(*at).map_err(fail)?),
      Step::Select { anchor, head } => {
        push(now, &doc.set_selection(*anchor, *head).map_err(fail)?)
      },
      Step::ToggleMark { mark } => push(now, &doc.toggle_mark(mark)),
      Step::Undo => {
        match doc.undo() {
          Some(applied) => push(now, &applied),
          None => log::warn!("step {index}: nothing to undo"),
        }
      },
      Step::Redo => {
        match doc.redo() {
          Some(applied) => push(now, &applied),
          None => log::warn!("step {index}: nothing to redo"),
        }
      },
      Step::Meta { key } => push(now, &doc.set_meta(key)),
      Step::Wait { ms } => now += Duration::from_millis(*ms),
      Step::SelectRecord { record } => timeline.intent(now, Intent::Select(*record)),
      Step::Replay => timeline.intent(now, Intent::Replay),
      Step::ToggleAnimation => timeline.intent(now, Intent::ToggleAnimation),
      Step::Pause => timeline.intent(now, Intent::Pause),
      Step::Resume => timeline.intent(now, Intent::Resume),
      Step::Highlight { step } => timeline.intent(now, Intent::Highlight(*step)),
      Step::Clear => timeline.intent(now, Intent::Clear),
    }
  }

  timeline.end = now;
  log::debug!(
    "compiled {} steps into {} inputs over {}ms",
    script.steps.len(),
    timeline.inputs.len(),
    now.as_millis()
  );
  Ok(timeline)
}

impl Timeline {
  fn intent(&mut self, at: Duration, intent: Intent) {
    self.inputs.push(TimedInput {
      at,
      input: Input::Intent(intent),
    });
  }
}

impl RecordRef {
  /// Resolve against the id of the latest logged record.
  pub fn resolve(self, latest: Option<TransactionId>) -> Option<TransactionId> {
    match self {
      Self::Id(id) => Some(TransactionId::new(id)),
      Self::Keyword(RecordKeyword::Latest) => latest,
      Self::Keyword(RecordKeyword::Live) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use the_lib::classify::Category;

  use super::*;

  const DEMO: &str = r#"
initial = "ab"

[[step]]
type = "type"
text = "cd"
delay-ms = 50

[[step]]
type = "wait"
ms = 700

[[step]]
type = "select"
anchor = 0
head = 2

[[step]]
type = "toggle-mark"
mark = "strong"

[[step]]
type = "select-record"
record = "latest"

[[step]]
type = "select-record"
record = 3

[[step]]
type = "undo"
"#;

  #[test]
  fn compiles_steps_in_time_order() {
    let script = parse(DEMO).unwrap();
    let timeline = compile(&script).unwrap();

    let offsets: Vec<u128> = timeline
      .inputs
      .iter()
      .map(|timed| timed.at.as_millis())
      .collect();
    assert_eq!(offsets, vec![0, 50, 750, 750, 750, 750, 750]);
    assert_eq!(timeline.end, Duration::from_millis(750));

    let categories: Vec<Category> = timeline.transactions().map(|r| r.category).collect();
    assert_eq!(categories, vec![
      Category::DocumentEdit,
      Category::DocumentEdit,
      Category::SelectionOnly,
      Category::MarkEdit,
      Category::HistoryOp,
    ]);
    assert!(matches!(
      timeline.inputs[4].input,
      Input::Intent(Intent::Select(RecordRef::Keyword(RecordKeyword::Latest)))
    ));
    assert!(matches!(
      timeline.inputs[5].input,
      Input::Intent(Intent::Select(RecordRef::Id(3)))
    ));
  }

  #[test]
  fn failing_steps_report_their_index() {
    let script = parse("[[step]]\ntype = \"delete\"\nfrom = 0\nto = 9\n").unwrap();
    let err = compile(&script).unwrap_err();
    assert!(matches!(err, ScriptError::Step { index: 0, .. }));
  }

  #[test]
  fn demo_script_compiles() {
    let script = parse(include_str!("scripts/demo.toml")).unwrap();
    let timeline = compile(&script).unwrap();
    assert_eq!(timeline.transactions().count(), 13);
    assert_eq!(timeline.end, Duration::from_millis(8200));
  }

  #[test]
  fn rejects_unknown_steps() {
    assert!(parse("[[step]]\ntype = \"explode\"\n").is_err());
  }

  #[test]
  fn record_refs_resolve() {
    let latest = Some(TransactionId::new(7));
    assert_eq!(RecordRef::Id(2).resolve(latest), Some(TransactionId::new(2)));
    assert_eq!(RecordRef::Keyword(RecordKeyword::Latest).resolve(latest), latest);
    assert_eq!(RecordRef::Keyword(RecordKeyword::Live).resolve(latest), None);
  }
}
