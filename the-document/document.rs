//! Document state and edit operations.
//!
//! A [`Document`] owns the current [`DocState`] and a linear undo history.
//! Every operation applies one transaction and returns it as an [`Applied`]:
//! both states, the steps in their serialized form, and the change flags.
//! [`Applied::event`] borrows that as the [`EditEvent`] an inspector
//! consumes.
//!
//! # Positions
//!
//! Positions are character offsets into the text, with paragraphs joined by
//! `\n`. The separator occupies a position but is not counted as a
//! character of content:
//!
//! ```text
//! "ab\ncd"   positions 0..=5, char_count 4, two paragraphs
//! ```

use ropey::Rope;
use serde_json::{
  Value,
  json,
};
use the_lib::engine::{
  DocumentState,
  EditEvent,
  HistoryAction,
  RawStep,
  RenderError,
  ResolvedPosition,
};
use thiserror::Error;

use crate::{
  Tendril,
  marks::{
    MarkSet,
    Marks,
    tags,
  },
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
  #[error("position {pos} is out of bounds (len: {len})")]
  OutOfBounds { pos: usize, len: usize },
  #[error("range {from}..{to} is inverted")]
  InvertedRange { from: usize, to: usize },
  #[error("edit changes nothing")]
  EmptyChange,
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// One immutable document state. Cloning is cheap for the text.
#[derive(Debug, Clone, PartialEq)]
pub struct DocState {
  text:         Rope,
  marks:        Marks,
  anchor:       usize,
  head:         usize,
  stored_marks: Option<MarkSet>,
}

struct Run {
  text:  String,
  marks: MarkSet,
}

impl DocState {
  pub fn new(text: &str) -> Self {
    Self {
      text:         Rope::from_str(text),
      marks:        Marks::default(),
      anchor:       0,
      head:         0,
      stored_marks: None,
    }
  }

  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn marks(&self) -> &Marks {
    &self.marks
  }

  pub fn len_chars(&self) -> usize {
    self.text.len_chars()
  }

  /// Ordered selection bounds.
  pub fn range(&self) -> (usize, usize) {
    (self.anchor.min(self.head), self.anchor.max(self.head))
  }

  fn check_pos(&self, pos: usize) -> Result<()> {
    let len = self.len_chars();
    if pos > len {
      return Err(DocumentError::OutOfBounds { pos, len });
    }
    Ok(())
  }

  fn char(&self, pos: usize) -> Option<char> {
    (pos < self.len_chars()).then(|| self.text.char(pos))
  }

  fn mark_set_at(&self, pos: usize) -> MarkSet {
    let before = pos.checked_sub(1).filter(|&p| self.char(p) != Some('\n'));
    match before {
      Some(p) => self.marks.at(p),
      None if self.char(pos).is_some_and(|ch| ch != '\n') => self.marks.at(pos),
      None => MarkSet::new(),
    }
  }

  /// Text runs with identical marks, per paragraph. There is always at
  /// least one paragraph.
  fn paragraphs(&self) -> Vec<Vec<Run>> {
    let mut paragraphs: Vec<Vec<Run>> = vec![Vec::new()];
    for (pos, ch) in self.text.chars().enumerate() {
      if ch == '\n' {
        paragraphs.push(Vec::new());
        continue;
      }
      let marks = self.marks.at(pos);
      let Some(runs) = paragraphs.last_mut() else {
        continue;
      };
      match runs.last_mut() {
        Some(run) if run.marks == marks => run.text.push(ch),
        _ => {
          runs.push(Run {
            text: ch.to_string(),
            marks,
          })
        },
      }
    }
    paragraphs
  }

  fn paragraph_start(&self, pos: usize) -> usize {
    let mut start = pos;
    while start > 0 && self.text.char(start - 1) != '\n' {
      start -= 1;
    }
    start
  }
}

fn escape(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      _ => out.push(ch),
    }
  }
  out
}

impl DocumentState for DocState {
  fn char_count(&self) -> usize {
    self.text.chars().filter(|&ch| ch != '\n').count()
  }

  fn to_json(&self) -> Value {
    let content: Vec<Value> = self
      .paragraphs()
      .into_iter()
      .map(|runs| {
        if runs.is_empty() {
          return json!({"type": "paragraph"});
        }
        let nodes: Vec<Value> = runs
          .into_iter()
          .map(|run| {
            if run.marks.is_empty() {
              json!({"type": "text", "text": run.text})
            } else {
              let marks: Vec<Value> = run
                .marks
                .iter()
                .map(|mark| json!({"type": mark.as_str()}))
                .collect();
              json!({"type": "text", "text": run.text, "marks": marks})
            }
          })
          .collect();
        json!({"type": "paragraph", "content": nodes})
      })
      .collect();
    json!({"type": "doc", "content": content})
  }

  fn render_markup(&self) -> std::result::Result<String, RenderError> {
    let mut out = String::new();
    for runs in self.paragraphs() {
      out.push_str("<p>");
      for run in runs {
        let wrap = run
          .marks
          .iter()
          .map(|mark| tags(mark).ok_or_else(|| RenderError::UnknownNode(mark.to_string())))
          .collect::<std::result::Result<Vec<_>, _>>()?;
        for (open, _) in &wrap {
          out.push_str(open);
        }
        out.push_str(&escape(&run.text));
        for (_, close) in wrap.iter().rev() {
          out.push_str(close);
        }
      }
      out.push_str("</p>");
    }
    Ok(out)
  }

  fn selection(&self) -> (usize, usize) {
    (self.anchor, self.head)
  }

  fn text_between(&self, from: usize, to: usize) -> String {
    let len = self.len_chars();
    let to = to.min(len);
    let from = from.min(to);
    self.text.slice(from..to).to_string()
  }

  fn stored_marks(&self) -> Option<Vec<String>> {
    self
      .stored_marks
      .as_ref()
      .map(|set| set.iter().map(|mark| mark.to_string()).collect())
  }

  fn marks_at(&self, pos: usize) -> Vec<String> {
    self
      .mark_set_at(pos)
      .iter()
      .map(|mark| mark.to_string())
      .collect()
  }

  fn resolve(&self, pos: usize) -> Option<ResolvedPosition> {
    if pos > self.len_chars() {
      return None;
    }
    let start = self.paragraph_start(pos);
    let parent_offset = pos - start;
    let at_end = self.char(pos).is_none_or(|ch| ch == '\n');

    // Offset into the text node (run of equally marked text) before `pos`.
    let mut run_start = start;
    for p in start + 1..pos {
      if self.marks.at(p) != self.marks.at(p - 1) {
        run_start = p;
      }
    }
    let text_offset = pos - run_start;

    Some(ResolvedPosition {
      pos,
      depth: 1,
      parent: "paragraph".to_string(),
      parent_offset,
      text_offset,
      node_before: (parent_offset > 0).then(|| "text".to_string()),
      node_after: (!at_end).then(|| "text".to_string()),
    })
  }
}

/// One applied transaction.
#[derive(Debug, Clone)]
pub struct Applied {
  pub before:            DocState,
  pub after:             DocState,
  pub steps:             Vec<RawStep>,
  pub doc_changed:       bool,
  pub selection_changed: bool,
  pub history:           Option<HistoryAction>,
  pub source:            Option<String>,
}

impl Applied {
  pub fn event(&self) -> EditEvent<'_, DocState> {
    EditEvent {
      steps:             &self.steps,
      doc_changed:       self.doc_changed,
      selection_changed: self.selection_changed,
      history:           self.history,
      source:            self.source.as_deref(),
      before:            &self.before,
      after:             &self.after,
    }
  }
}

#[derive(Debug, Clone)]
struct Revision {
  before:  DocState,
  after:   DocState,
  steps:   Vec<RawStep>,
  inverse: Vec<RawStep>,
}

#[derive(Debug, Clone)]
pub struct Document {
  state: DocState,
  undo:  Vec<Revision>,
  redo:  Vec<Revision>,
}

impl Default for Document {
  fn default() -> Self {
    Self::new("")
  }
}

impl Document {
  pub fn new(text: &str) -> Self {
    Self {
      state: DocState::new(text),
      undo:  Vec::new(),
      redo:  Vec::new(),
    }
  }

  pub fn state(&self) -> &DocState {
    &self.state
  }

  pub fn text(&self) -> String {
    self.state.text.to_string()
  }

  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }

  pub fn insert_text(&mut self, at: usize, text: &str) -> Result<Applied> {
    self.replace_with_source(at, at, text, None)
  }

  pub fn delete(&mut self, from: usize, to: usize) -> Result<Applied> {
    self.replace_with_source(from, to, "", None)
  }

  pub fn replace(&mut self, from: usize, to: usize, text: &str) -> Result<Applied> {
    self.replace_with_source(from, to, text, None)
  }

  /// Split the paragraph at `at`.
  pub fn split_paragraph(&mut self, at: usize) -> Result<Applied> {
    self.replace_with_source(at, at, "\n", Some("keydown: key=\"Enter\"".to_string()))
  }

  /// Replace the selection with one typed character.
  pub fn type_char(&mut self, ch: char) -> Result<Applied> {
    let (from, to) = self.state.range();
    let source = format!("keydown: key=\"{ch}\"");
    self.replace_with_source(from, to, ch.encode_utf8(&mut [0; 4]), Some(source))
  }

  /// Type `text` one character at a time, one transaction each.
  pub fn type_text(&mut self, text: &str) -> Result<Vec<Applied>> {
    text.chars().map(|ch| self.type_char(ch)).collect()
  }

  fn replace_with_source(
    &mut self,
    from: usize,
    to: usize,
    text: &str,
    source: Option<String>,
  ) -> Result<Applied> {
    if from > to {
      return Err(DocumentError::InvertedRange { from, to });
    }
    self.state.check_pos(to)?;
    if from == to && text.is_empty() {
      return Err(DocumentError::EmptyChange);
    }

    let before = self.state.clone();
    let inserted_marks = before
      .stored_marks
      .clone()
      .unwrap_or_else(|| before.mark_set_at(from));
    let removed = before.text_between(from, to);
    let inserted = text.chars().count();

    let state = &mut self.state;
    state.text.remove(from..to);
    state.marks.shift_delete(from, to);
    state.text.insert(from, text);
    state.marks.shift_insert(from, inserted);
    if inserted > 0 {
      state
        .marks
        .assign(from, from + inserted, &inserted_marks);
    }
    let map = |pos: usize| {
      if pos < from {
        pos
      } else if pos >= to {
        pos - (to - from) + inserted
      } else {
        from + inserted
      }
    };
    state.anchor = map(state.anchor);
    state.head = map(state.head);
    state.stored_marks = None;

    let delta = content_len(text) as i64 - content_len(&removed) as i64;
    let step = RawStep::from_json(replace_json(from, to, text)).with_char_delta(delta);
    let inverse = RawStep::from_json(replace_json(from, from + inserted, &removed))
      .with_char_delta(-delta);

    tracing::trace!(from, to, inserted, delta, "replace");
    Ok(self.commit(before, vec![step], vec![inverse], source))
  }

  pub fn set_selection(&mut self, anchor: usize, head: usize) -> Result<Applied> {
    self.state.check_pos(anchor)?;
    self.state.check_pos(head)?;
    let before = self.state.clone();
    self.state.anchor = anchor;
    self.state.head = head;
    self.state.stored_marks = None;
    Ok(self.transient(before, None))
  }

  /// Toggle `mark` on the selection. On a cursor this only changes the
  /// marks the next typed character receives.
  pub fn toggle_mark(&mut self, mark: &str) -> Applied {
    let (from, to) = self.state.range();
    let before = self.state.clone();

    if from == to {
      let mut set = before
        .stored_marks
        .clone()
        .unwrap_or_else(|| before.mark_set_at(from));
      if let Some(idx) = set.iter().position(|m| m.as_str() == mark) {
        set.remove(idx);
      } else {
        set.push(Tendril::from(mark));
        set.sort();
      }
      self.state.stored_marks = Some(set);
      return self.transient(before, None);
    }

    let (step_type, inverse_type) = if before.marks.covers(from, to, mark) {
      self.state.marks.remove(from, to, mark);
      ("removeMark", "addMark")
    } else {
      self.state.marks.add(from, to, mark);
      ("addMark", "removeMark")
    };
    let mark_json = |step_type: &str| {
      RawStep::from_json(json!({
        "stepType": step_type,
        "mark": {"type": mark},
        "from": from,
        "to": to,
      }))
    };
    let steps = vec![mark_json(step_type)];
    let inverse = vec![mark_json(inverse_type)];
    self.commit(before, steps, inverse, None)
  }

  /// A transaction that changes nothing but carries metadata.
  pub fn set_meta(&mut self, key: &str) -> Applied {
    let before = self.state.clone();
    self.transient(before, Some(format!("meta: {key}")))
  }

  pub fn undo(&mut self) -> Option<Applied> {
    let revision = self.undo.pop()?;
    let before = std::mem::replace(&mut self.state, revision.before.clone());
    let mut steps = revision.inverse.clone();
    steps.reverse();
    self.redo.push(revision);
    Some(self.history_applied(before, steps, HistoryAction::Undo))
  }

  pub fn redo(&mut self) -> Option<Applied> {
    let revision = self.redo.pop()?;
    let before = std::mem::replace(&mut self.state, revision.after.clone());
    let steps = revision.steps.clone();
    self.undo.push(revision);
    Some(self.history_applied(before, steps, HistoryAction::Redo))
  }

  fn commit(
    &mut self,
    before: DocState,
    steps: Vec<RawStep>,
    inverse: Vec<RawStep>,
    source: Option<String>,
  ) -> Applied {
    self.undo.push(Revision {
      before:  before.clone(),
      after:   self.state.clone(),
      steps:   steps.clone(),
      inverse,
    });
    self.redo.clear();
    self.applied(before, steps, None, source)
  }

  fn transient(&mut self, before: DocState, source: Option<String>) -> Applied {
    self.applied(before, Vec::new(), None, source)
  }

  fn history_applied(&self, before: DocState, steps: Vec<RawStep>, action: HistoryAction) -> Applied {
    let source = match action {
      HistoryAction::Undo => "history: undo",
      HistoryAction::Redo => "history: redo",
    };
    self.applied(before, steps, Some(action), Some(source.to_string()))
  }

  fn applied(
    &self,
    before: DocState,
    steps: Vec<RawStep>,
    history: Option<HistoryAction>,
    source: Option<String>,
  ) -> Applied {
    let after = self.state.clone();
    Applied {
      doc_changed: !steps.is_empty(),
      selection_changed: before.selection() != after.selection(),
      before,
      after,
      steps,
      history,
      source,
    }
  }
}

fn content_len(text: &str) -> usize {
  text.chars().filter(|&ch| ch != '\n').count()
}

fn replace_json(from: usize, to: usize, text: &str) -> Value {
  if text.is_empty() {
    json!({"stepType": "replace", "from": from, "to": to})
  } else {
    json!({
      "stepType": "replace",
      "from": from,
      "to": to,
      "slice": {"content": [{"type": "text", "text": text}]},
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replace_maps_the_selection() {
    let mut doc = Document::new("abc");
    doc.set_selection(1, 1).unwrap();
    let applied = doc.insert_text(0, "x").unwrap();
    assert_eq!(doc.text(), "xabc");
    assert_eq!(applied.after.selection(), (2, 2));
    assert!(applied.selection_changed);
    assert_eq!(applied.steps[0].char_delta, Some(1));

    doc.set_selection(1, 3).unwrap();
    doc.replace(1, 3, "Z").unwrap();
    assert_eq!(doc.text(), "xZc");
    assert_eq!(doc.state().selection(), (2, 2));
  }

  #[test]
  fn rejects_bad_positions() {
    let mut doc = Document::new("ab");
    assert_eq!(
      doc.insert_text(3, "x").unwrap_err(),
      DocumentError::OutOfBounds { pos: 3, len: 2 }
    );
    assert_eq!(
      doc.delete(2, 1).unwrap_err(),
      DocumentError::InvertedRange { from: 2, to: 1 }
    );
    assert_eq!(doc.delete(1, 1).unwrap_err(), DocumentError::EmptyChange);
    assert!(doc.set_selection(0, 9).is_err());
  }

  #[test]
  fn paragraphs_serialize_and_render() {
    let mut doc = Document::new("ab\n\ncd");
    doc.set_selection(0, 1).unwrap();
    doc.toggle_mark("strong");
    let state = doc.state();

    assert_eq!(state.char_count(), 4);
    assert_eq!(
      state.render_markup().unwrap(),
      "<p><strong>a</strong>b</p><p></p><p>cd</p>"
    );
    let json = state.to_json();
    assert_eq!(json["content"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["content"][0]["content"][0]["marks"][0]["type"], "strong");
    assert!(json["content"][1].get("content").is_none());
  }

  #[test]
  fn unknown_marks_fail_to_render() {
    let mut doc = Document::new("ab");
    doc.set_selection(0, 2).unwrap();
    doc.toggle_mark("highlight");
    assert_eq!(
      doc.state().render_markup(),
      Err(RenderError::UnknownNode("highlight".into()))
    );
  }

  #[test]
  fn typed_text_inherits_marks() {
    let mut doc = Document::new("");
    let applied = doc.toggle_mark("em");
    assert!(applied.steps.is_empty());
    assert_eq!(doc.state().stored_marks(), Some(vec!["em".to_string()]));

    let typed = doc.type_text("hi").unwrap();
    assert_eq!(typed.len(), 2);
    assert_eq!(typed[0].source.as_deref(), Some("keydown: key=\"h\""));
    assert_eq!(doc.state().render_markup().unwrap(), "<p><em>hi</em></p>");
    assert_eq!(doc.state().marks_at(2), vec!["em".to_string()]);
  }

  #[test]
  fn toggling_twice_removes_the_mark() {
    let mut doc = Document::new("abc");
    doc.set_selection(0, 3).unwrap();
    let add = doc.toggle_mark("strong");
    assert_eq!(add.steps[0].json["stepType"], "addMark");
    let remove = doc.toggle_mark("strong");
    assert_eq!(remove.steps[0].json["stepType"], "removeMark");
    assert!(doc.state().marks().is_empty());
  }

  #[test]
  fn undo_and_redo_restore_states() {
    let mut doc = Document::new("");
    doc.insert_text(0, "abc").unwrap();
    doc.delete(0, 1).unwrap();
    assert_eq!(doc.text(), "bc");

    let undone = doc.undo().unwrap();
    assert_eq!(undone.history, Some(HistoryAction::Undo));
    assert_eq!(undone.steps[0].char_delta, Some(1));
    assert_eq!(doc.text(), "abc");

    let redone = doc.redo().unwrap();
    assert_eq!(redone.steps[0].char_delta, Some(-1));
    assert_eq!(doc.text(), "bc");

    doc.undo();
    doc.undo();
    assert_eq!(doc.text(), "");
    assert!(doc.undo().is_none());
    assert!(doc.can_redo());

    doc.insert_text(0, "z").unwrap();
    assert!(!doc.can_redo());
  }

  #[test]
  fn resolves_positions() {
    let doc = Document::new("ab\ncd");
    let pos = doc.state().resolve(4).unwrap();
    assert_eq!(pos.parent_offset, 1);
    assert_eq!(pos.node_before.as_deref(), Some("text"));
    assert_eq!(pos.node_after.as_deref(), Some("text"));

    let end = doc.state().resolve(2).unwrap();
    assert_eq!(end.node_after, None);
    assert!(doc.state().resolve(6).is_none());
  }
}
