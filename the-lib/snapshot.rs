//! Point-in-time summaries of a document state.
//!
//! # Selection model
//!
//! A [`SelectionDescriptor`] has two positions: `anchor` and `head`. The
//! `head` is where the cursor visually appears, the `anchor` is the other end
//! of the selection. When `anchor == head` the selection is a cursor.
//!
//! ```text
//! anchor=2, head=7: "he[llo w]orld"  (forward selection)
//! anchor=7, head=2: "he]llo w[orld"  (backward selection)
//! anchor=5, head=5: "hello|world"    (cursor)
//! ```
//!
//! `from` and `to` are stored already ordered, so `from <= to` holds for
//! every descriptor regardless of direction.
//!
//! # Snapshots
//!
//! [`snapshot`] is taken twice per transaction, before and after. It walks
//! the whole serialized tree to count nodes; nothing is cached between
//! snapshots.

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::engine::{
  DocumentState,
  ResolvedPosition,
};

/// Maximum number of characters of selected text kept for preview.
pub const SELECTION_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
  Cursor,
  Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescriptor {
  pub anchor: usize,
  pub head:   usize,
  pub from:   usize,
  pub to:     usize,
  pub empty:  bool,
  pub kind:   SelectionKind,
  /// Selected text, truncated to [`SELECTION_PREVIEW_CHARS`].
  pub text:   String,
}

impl SelectionDescriptor {
  /// Describe the selection `anchor..head`. `text_between` is only consulted
  /// for non-empty selections.
  pub fn new<F>(anchor: usize, head: usize, text_between: F) -> Self
  where
    F: FnOnce(usize, usize) -> String,
  {
    let from = std::cmp::min(anchor, head);
    let to = std::cmp::max(anchor, head);
    let empty = from == to;
    let text = if empty {
      String::new()
    } else {
      truncate_chars(&text_between(from, to), SELECTION_PREVIEW_CHARS)
    };
    Self {
      anchor,
      head,
      from,
      to,
      empty,
      kind: if empty {
        SelectionKind::Cursor
      } else {
        SelectionKind::Range
      },
      text,
    }
  }

  #[inline]
  pub fn point(pos: usize) -> Self {
    Self::new(pos, pos, |_, _| String::new())
  }

  /// Length of the selection.
  #[inline]
  #[must_use]
  pub fn len(&self) -> usize {
    self.to - self.from
  }

  #[inline]
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.empty
  }
}

/// Rendered output of a state, or the structural fallback when the engine
/// could not render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedView {
  pub text:     String,
  pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub version:      u64,
  pub char_count:   usize,
  pub node_count:   usize,
  pub doc:          Value,
  pub rendered:     RenderedView,
  pub selection:    SelectionDescriptor,
  pub active_marks: Vec<String>,
  pub has_marks:    bool,
  pub resolved:     Option<ResolvedPosition>,
}

/// Capture `state` as the document at `version`.
pub fn snapshot<S: DocumentState + ?Sized>(state: &S, version: u64) -> Snapshot {
  let doc = state.to_json();
  let rendered = match state.render_markup() {
    Ok(text) => {
      RenderedView {
        text,
        fallback: false,
      }
    },
    Err(err) => {
      tracing::warn!(%err, "falling back to structural view for rendered output");
      RenderedView {
        text:     pretty_json(&doc),
        fallback: true,
      }
    },
  };

  let (anchor, head) = state.selection();
  let selection = SelectionDescriptor::new(anchor, head, |from, to| state.text_between(from, to));
  let active_marks = active_marks(state, &selection);

  Snapshot {
    version,
    char_count: state.char_count(),
    node_count: count_nodes(&doc),
    has_marks: has_marks(&doc),
    rendered,
    active_marks,
    resolved: state.resolve(anchor),
    selection,
    doc,
  }
}

/// Formatting that the next inserted character would receive for a cursor,
/// or the formatting at the anchor for a range.
fn active_marks<S: DocumentState + ?Sized>(
  state: &S,
  selection: &SelectionDescriptor,
) -> Vec<String> {
  if selection.empty {
    state
      .stored_marks()
      .unwrap_or_else(|| state.marks_at(selection.head))
  } else {
    state.marks_at(selection.anchor)
  }
}

/// Number of descendants of the root node.
pub fn count_nodes(doc: &Value) -> usize {
  children(doc)
    .map(|child| 1 + count_nodes(child))
    .sum()
}

/// Whether any node in the tree carries a mark.
pub fn has_marks(doc: &Value) -> bool {
  let own = doc
    .get("marks")
    .and_then(Value::as_array)
    .is_some_and(|marks| !marks.is_empty());
  own || children(doc).any(has_marks)
}

fn children(node: &Value) -> impl Iterator<Item = &Value> {
  node
    .get("content")
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
}

pub(crate) fn pretty_json(value: &Value) -> String {
  serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
  match text.char_indices().nth(max) {
    Some((idx, _)) => text[..idx].to_string(),
    None => text.to_string(),
  }
}
