//! Semantic classification of edit events.
//!
//! Every transaction gets exactly one [`Category`]. The first matching rule
//! wins:
//!
//! 1. a history marker (undo/redo) gives [`Category::HistoryOp`], even if the
//!    transaction also changed content;
//! 2. a content change gives [`Category::MarkEdit`] when every step is a mark
//!    step, [`Category::DocumentEdit`] otherwise;
//! 3. a selection change gives [`Category::SelectionOnly`];
//! 4. anything else is [`Category::Meta`].
//!
//! A transaction is never split into several records, even when it mixes
//! text and formatting steps.

use std::fmt;

use serde::{
  Deserialize,
  Serialize,
};
use smallvec::SmallVec;

use crate::engine::{
  DocumentState,
  EditEvent,
  RawStepKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  DocumentEdit,
  SelectionOnly,
  MarkEdit,
  HistoryOp,
  Meta,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Category::DocumentEdit,
    Category::SelectionOnly,
    Category::MarkEdit,
    Category::HistoryOp,
    Category::Meta,
  ];

  /// Short lowercase tag, as shown in the transaction list.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::DocumentEdit => "doc",
      Self::SelectionOnly => "selection",
      Self::MarkEdit => "mark",
      Self::HistoryOp => "history",
      Self::Meta => "meta",
    }
  }

  /// Whether a record of this category may legitimately carry no steps.
  pub fn allows_empty_steps(self) -> bool {
    matches!(self, Self::SelectionOnly | Self::Meta | Self::HistoryOp)
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
  Insert,
  Delete,
  Replace,
  AddMark,
  RemoveMark,
  Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
  pub kind:  StepKind,
  /// Character delta, for text steps.
  pub delta: Option<i64>,
  /// Display label, e.g. `INSERT +1` or `+STRONG`.
  pub label: String,
}

impl StepDescriptor {
  pub fn text(delta: i64) -> Self {
    let (kind, label) = match delta {
      d if d > 0 => (StepKind::Insert, format!("INSERT +{d}")),
      d if d < 0 => (StepKind::Delete, format!("DELETE {d}")),
      _ => (StepKind::Replace, "REPLACE".to_string()),
    };
    Self {
      kind,
      delta: Some(delta),
      label,
    }
  }

  pub fn add_mark(mark: &str) -> Self {
    Self {
      kind:  StepKind::AddMark,
      delta: None,
      label: format!("+{}", mark.to_uppercase()),
    }
  }

  pub fn remove_mark(mark: &str) -> Self {
    Self {
      kind:  StepKind::RemoveMark,
      delta: None,
      label: format!("-{}", mark.to_uppercase()),
    }
  }

  pub fn other(step_type: &str) -> Self {
    let label = step_type.to_uppercase();
    Self {
      kind: StepKind::Other(step_type.to_string()),
      delta: None,
      label,
    }
  }
}

pub type Steps = SmallVec<[StepDescriptor; 4]>;

pub fn classify<S: DocumentState + ?Sized>(event: &EditEvent<'_, S>) -> Category {
  if event.history.is_some() {
    Category::HistoryOp
  } else if event.changes_content() {
    if event.steps.iter().all(|step| step.kind.is_mark()) {
      Category::MarkEdit
    } else {
      Category::DocumentEdit
    }
  } else if event.selection_changed {
    Category::SelectionOnly
  } else {
    Category::Meta
  }
}

/// Describe each raw step in execution order. `char_delta` is the delta of
/// the whole transaction, used for steps that do not report their own.
pub fn describe_steps<S: DocumentState + ?Sized>(
  event: &EditEvent<'_, S>,
  char_delta: i64,
) -> Steps {
  if !event.doc_changed {
    return Steps::new();
  }

  event
    .steps
    .iter()
    .map(|step| {
      match &step.kind {
        RawStepKind::Replace | RawStepKind::ReplaceAround => {
          StepDescriptor::text(step.char_delta.unwrap_or(char_delta))
        },
        RawStepKind::AddMark(mark) => StepDescriptor::add_mark(mark),
        RawStepKind::RemoveMark(mark) => StepDescriptor::remove_mark(mark),
        RawStepKind::Other(step_type) => StepDescriptor::other(step_type),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::{
    Value,
    json,
  };

  use super::*;
  use crate::engine::{
    HistoryAction,
    RawStep,
    RenderError,
  };

  struct Chars(usize);

  impl DocumentState for Chars {
    fn char_count(&self) -> usize {
      self.0
    }

    fn to_json(&self) -> Value {
      json!({"type": "doc"})
    }

    fn render_markup(&self) -> Result<String, RenderError> {
      Ok(String::new())
    }

    fn selection(&self) -> (usize, usize) {
      (0, 0)
    }

    fn text_between(&self, _from: usize, _to: usize) -> String {
      String::new()
    }

    fn stored_marks(&self) -> Option<Vec<String>> {
      None
    }

    fn marks_at(&self, _pos: usize) -> Vec<String> {
      Vec::new()
    }
  }

  fn replace() -> RawStep {
    RawStep::from_json(json!({"stepType": "replace"}))
  }

  fn strong() -> RawStep {
    RawStep::from_json(json!({"stepType": "addMark", "mark": {"type": "strong"}}))
  }

  fn event<'a>(
    steps: &'a [RawStep],
    doc_changed: bool,
    selection_changed: bool,
    history: Option<HistoryAction>,
    states: &'a (Chars, Chars),
  ) -> EditEvent<'a, Chars> {
    EditEvent {
      steps,
      doc_changed,
      selection_changed,
      history,
      source: None,
      before: &states.0,
      after: &states.1,
    }
  }

  #[test]
  fn history_marker_takes_precedence() {
    let states = (Chars(1), Chars(0));
    let steps = [replace()];
    let ev = event(&steps, true, true, Some(HistoryAction::Undo), &states);
    assert_eq!(classify(&ev), Category::HistoryOp);
  }

  #[test]
  fn mark_edit_needs_only_mark_steps() {
    let states = (Chars(3), Chars(3));
    let marks = [strong()];
    assert_eq!(
      classify(&event(&marks, true, false, None, &states)),
      Category::MarkEdit
    );

    let mixed = [strong(), replace()];
    assert_eq!(
      classify(&event(&mixed, true, false, None, &states)),
      Category::DocumentEdit
    );
  }

  #[test]
  fn selection_and_meta() {
    let states = (Chars(3), Chars(3));
    assert_eq!(
      classify(&event(&[], false, true, None, &states)),
      Category::SelectionOnly
    );
    assert_eq!(
      classify(&event(&[], false, false, None, &states)),
      Category::Meta
    );
    // A content flag without steps is not trusted.
    assert_eq!(
      classify(&event(&[], true, false, None, &states)),
      Category::Meta
    );
  }

  #[test]
  fn step_labels() {
    let states = (Chars(0), Chars(1));
    let steps = [
      replace(),
      replace().with_char_delta(-2),
      replace().with_char_delta(0),
      strong(),
      RawStep::from_json(json!({"stepType": "removeMark", "mark": {"type": "em"}})),
      RawStep::from_json(json!({"stepType": "attr"})),
    ];
    let ev = event(&steps, true, false, None, &states);
    let labels: Vec<_> = describe_steps(&ev, ev.char_delta())
      .into_iter()
      .map(|step| step.label)
      .collect();
    assert_eq!(
      labels,
      ["INSERT +1", "DELETE -2", "REPLACE", "+STRONG", "-EM", "ATTR"]
    );
  }

  quickcheck::quickcheck! {
    fn empty_steps_never_classify_as_content(doc: bool, sel: bool, undo: bool) -> bool {
      let states = (Chars(0), Chars(0));
      let history = undo.then_some(HistoryAction::Undo);
      let category = classify(&event(&[], doc, sel, history, &states));
      category.allows_empty_steps()
    }
  }
}
