//! Immutable transaction records.

use std::{
  fmt,
  sync::atomic::{
    AtomicU64,
    Ordering,
  },
};

use chrono::{
  DateTime,
  Local,
};
use serde::{
  Deserialize,
  Serialize,
};
use serde_json::{
  Value,
  json,
};

use crate::{
  classify::{
    Category,
    Steps,
    classify,
    describe_steps,
  },
  engine::{
    DocumentState,
    EditEvent,
    HistoryAction,
  },
  snapshot::{
    Snapshot,
    snapshot,
  },
};

/// Source recorded for transactions whose engine did not describe an input.
pub const PROGRAMMATIC_SOURCE: &str = "programmatic";

/// Process-wide, strictly increasing record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
  pub fn new(id: u64) -> Self {
    Self(id)
  }

  pub fn fresh() -> Self {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }

  pub fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for TransactionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
  pub id:          TransactionId,
  pub category:    Category,
  pub timestamp:   DateTime<Local>,
  pub source:      String,
  pub history:     Option<HistoryAction>,
  pub doc_changed: bool,
  pub steps:       Steps,
  /// The raw transaction as the engine serialized it.
  pub raw:         Value,
  pub before:      Snapshot,
  pub after:       Snapshot,
}

impl TransactionRecord {
  /// Character delta between the two snapshots.
  pub fn char_delta(&self) -> i64 {
    self.after.char_count as i64 - self.before.char_count as i64
  }

  /// One-line summary of the steps, `,`-separated.
  pub fn step_summary(&self) -> String {
    self
      .steps
      .iter()
      .map(|step| step.label.as_str())
      .collect::<Vec<_>>()
      .join(", ")
  }
}

/// Builds records from edit events. Owns the version counter of the observed
/// document, so one builder should be used per document.
#[derive(Debug, Default)]
pub struct RecordBuilder {
  version: u64,
}

impl RecordBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Version that the next record's `before` snapshot will carry.
  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn build<S: DocumentState + ?Sized>(&mut self, event: &EditEvent<'_, S>) -> TransactionRecord {
    let id = TransactionId::fresh();
    let category = classify(event);
    let char_delta = event.char_delta();
    let steps = describe_steps(event, char_delta);

    let before = snapshot(event.before, self.version);
    self.version += 1;
    let after = snapshot(event.after, self.version);

    let raw = json!({
      "steps": event.steps.iter().map(|step| step.json.clone()).collect::<Vec<_>>(),
      "docChanged": event.doc_changed,
      "selectionSet": event.selection_changed,
    });

    tracing::debug!(%id, %category, steps = steps.len(), char_delta, "built transaction record");

    TransactionRecord {
      id,
      category,
      timestamp: Local::now(),
      source: event
        .source
        .unwrap_or(PROGRAMMATIC_SOURCE)
        .to_string(),
      history: event.history,
      doc_changed: event.doc_changed,
      steps,
      raw,
      before,
      after,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::{
    engine::{
      RawStep,
      RenderError,
    },
    snapshot::SelectionDescriptor,
  };

  /// Plain-text state used across the crate's tests.
  #[derive(Debug, Clone)]
  pub(crate) struct TextState {
    pub text:      String,
    pub selection: (usize, usize),
  }

  impl TextState {
    pub(crate) fn new(text: &str) -> Self {
      Self {
        text:      text.to_string(),
        selection: (0, 0),
      }
    }
  }

  impl DocumentState for TextState {
    fn char_count(&self) -> usize {
      self.text.chars().count()
    }

    fn to_json(&self) -> Value {
      let content: Vec<Value> = self
        .text
        .split('\n')
        .map(|line| {
          if line.is_empty() {
            json!({"type": "paragraph"})
          } else {
            json!({"type": "paragraph", "content": [{"type": "text", "text": line}]})
          }
        })
        .collect();
      json!({"type": "doc", "content": content})
    }

    fn render_markup(&self) -> Result<String, RenderError> {
      Ok(
        self
          .text
          .split('\n')
          .map(|line| format!("<p>{line}</p>"))
          .collect(),
      )
    }

    fn selection(&self) -> (usize, usize) {
      self.selection
    }

    fn text_between(&self, from: usize, to: usize) -> String {
      self.text.chars().skip(from).take(to - from).collect()
    }

    fn stored_marks(&self) -> Option<Vec<String>> {
      None
    }

    fn marks_at(&self, _pos: usize) -> Vec<String> {
      Vec::new()
    }
  }

  /// Build a record for a plain text change from `before` to `after`.
  pub(crate) fn text_record(builder: &mut RecordBuilder, before: &str, after: &str) -> TransactionRecord {
    let before = TextState::new(before);
    let after = TextState::new(after);
    let steps = [RawStep::from_json(json!({"stepType": "replace"}))];
    builder.build(&EditEvent {
      steps:             &steps,
      doc_changed:       true,
      selection_changed: false,
      history:           None,
      source:            None,
      before:            &before,
      after:             &after,
    })
  }

  pub(crate) fn selection_record(builder: &mut RecordBuilder, anchor: usize, head: usize) -> TransactionRecord {
    let before = TextState::new("hello");
    let mut after = before.clone();
    after.selection = (anchor, head);
    builder.build(&EditEvent {
      steps:             &[],
      doc_changed:       false,
      selection_changed: true,
      history:           None,
      source:            Some("pointer"),
      before:            &before,
      after:             &after,
    })
  }

  #[test]
  fn ids_increase_and_versions_advance() {
    let mut builder = RecordBuilder::new();
    let first = text_record(&mut builder, "", "x");
    let second = text_record(&mut builder, "x", "xy");
    assert!(second.id > first.id);
    assert_eq!(first.before.version, 0);
    assert_eq!(first.after.version, 1);
    assert_eq!(second.before.version, 1);
    assert!(second.after.version > second.before.version);
    assert_eq!(builder.version(), 2);
  }

  #[test]
  fn insert_is_described_as_document_edit() {
    let mut builder = RecordBuilder::new();
    let record = text_record(&mut builder, "", "x");
    assert_eq!(record.category, Category::DocumentEdit);
    assert_eq!(record.step_summary(), "INSERT +1");
    assert_eq!(record.steps[0].delta, Some(1));
    assert_eq!(record.before.char_count, 0);
    assert_eq!(record.after.char_count, 1);
    assert_eq!(record.source, PROGRAMMATIC_SOURCE);
    assert_eq!(record.raw["steps"][0]["stepType"], "replace");
  }

  #[test]
  fn selection_record_has_no_steps() {
    let mut builder = RecordBuilder::new();
    let record = selection_record(&mut builder, 4, 1);
    assert_eq!(record.category, Category::SelectionOnly);
    assert!(record.steps.is_empty());
    assert_eq!(record.source, "pointer");
    assert_eq!(
      record.after.selection,
      SelectionDescriptor::new(4, 1, |_, _| "ell".to_string())
    );
  }
}
