//! The boundary between the inspector and the document engine it observes.
//!
//! The inspector never edits a document. An engine applies its own
//! transactions and, for each one, hands the inspector an [`EditEvent`]:
//! the raw steps, two change flags, optional history provenance and
//! read access to the states before and after the transaction.
//!
//! Everything the inspector needs from a state goes through
//! [`DocumentState`]. Steps are described by their serialized form, the
//! same JSON shape a ProseMirror-style engine produces for `step.toJSON()`:
//!
//! ```text
//! {"stepType": "replace", "from": 1, "to": 1, "slice": {...}}
//! {"stepType": "addMark", "from": 1, "to": 4, "mark": {"type": "strong"}}
//! ```

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;
use thiserror::Error;

/// Failure to produce a rendered view of a document state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RenderError {
  #[error("document has no renderer for node type `{0}`")]
  UnknownNode(String),
  #[error("renderer failed: {0}")]
  Failed(String),
}

/// Read access to one immutable document state.
pub trait DocumentState {
  /// Number of characters of text content. Block boundaries do not count.
  fn char_count(&self) -> usize;

  /// Serialized document tree. Every node is an object with a `type`, and
  /// optionally `content` (child nodes), `text` and `marks`.
  fn to_json(&self) -> Value;

  /// Rendered markup for the document content.
  fn render_markup(&self) -> Result<String, RenderError>;

  /// Current selection as `(anchor, head)`.
  fn selection(&self) -> (usize, usize);

  /// Plain text between two positions.
  fn text_between(&self, from: usize, to: usize) -> String;

  /// Marks that will be applied to the next inserted text, if the engine
  /// tracks them explicitly.
  fn stored_marks(&self) -> Option<Vec<String>>;

  /// Marks applying at a position.
  fn marks_at(&self, pos: usize) -> Vec<String>;

  /// Structural description of a position.
  fn resolve(&self, pos: usize) -> Option<ResolvedPosition> {
    let _ = pos;
    None
  }
}

/// Where a position sits in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPosition {
  pub pos:           usize,
  pub depth:         usize,
  pub parent:        String,
  pub parent_offset: usize,
  pub text_offset:   usize,
  pub node_before:   Option<String>,
  pub node_after:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mark", rename_all = "snake_case")]
pub enum RawStepKind {
  Replace,
  ReplaceAround,
  AddMark(String),
  RemoveMark(String),
  Other(String),
}

impl RawStepKind {
  pub fn is_mark(&self) -> bool {
    matches!(self, Self::AddMark(_) | Self::RemoveMark(_))
  }
}

/// One primitive step exactly as the engine reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
  pub kind:       RawStepKind,
  /// Character delta of this step alone, when the engine knows it.
  pub char_delta: Option<i64>,
  pub json:       Value,
}

impl RawStep {
  /// Interpret a serialized step. Missing or unexpected fields degrade to
  /// [`RawStepKind::Other`] instead of failing.
  pub fn from_json(json: Value) -> Self {
    let step_type = json
      .get("stepType")
      .and_then(Value::as_str)
      .unwrap_or("step");
    let mark = || {
      json
        .pointer("/mark/type")
        .and_then(Value::as_str)
        .unwrap_or("mark")
        .to_string()
    };
    let kind = match step_type {
      "replace" => RawStepKind::Replace,
      "replaceAround" => RawStepKind::ReplaceAround,
      "addMark" => RawStepKind::AddMark(mark()),
      "removeMark" => RawStepKind::RemoveMark(mark()),
      other => RawStepKind::Other(other.to_string()),
    };
    Self {
      kind,
      char_delta: None,
      json,
    }
  }

  pub fn with_char_delta(mut self, delta: i64) -> Self {
    self.char_delta = Some(delta);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
  Undo,
  Redo,
}

/// Everything the engine reports about one applied transaction.
#[derive(Debug, Clone, Copy)]
pub struct EditEvent<'a, S: ?Sized> {
  pub steps:             &'a [RawStep],
  pub doc_changed:       bool,
  pub selection_changed: bool,
  pub history:           Option<HistoryAction>,
  /// Description of the input that produced the transaction.
  pub source:            Option<&'a str>,
  pub before:            &'a S,
  pub after:             &'a S,
}

impl<'a, S: DocumentState + ?Sized> EditEvent<'a, S> {
  /// Text delta across the whole transaction.
  pub fn char_delta(&self) -> i64 {
    self.after.char_count() as i64 - self.before.char_count() as i64
  }

  /// Whether the transaction changed document content. A `doc_changed` flag
  /// without any step is not trusted.
  pub fn changes_content(&self) -> bool {
    self.doc_changed && !self.steps.is_empty()
  }
}
