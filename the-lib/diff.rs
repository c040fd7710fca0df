//! Side-by-side line diffs between two serialized snapshots.
//!
//! The core ([`compute_line_diff`]) only knows about lines. Structured inputs
//! go through a normalisation front-end first: [`normalize_json`] pretty
//! prints a document tree and [`normalize_markup`] puts one tag per line.
//!
//! The result is two columns of equal length. Within every changed hunk the
//! removed lines come first, then the added lines, and the opposite column is
//! padded with [`LineKind::Empty`] placeholders:
//!
//! ```text
//! left             right
//! <p>              <p>
//! - hello          (empty)
//! (empty)          + hello world
//! </p>             </p>
//! ```

use std::time::Instant;

use imara_diff::{
  Algorithm,
  Diff,
  Hunk,
  IndentHeuristic,
  IndentLevel,
  InternedInput,
};
use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::{
  record::TransactionRecord,
  snapshot::pretty_json,
};

const INDENT_WIDTH: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
  Unchanged,
  Added,
  Removed,
  Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
  pub text: String,
  pub kind: LineKind,
}

impl DiffLine {
  fn new(text: &str, kind: LineKind) -> Self {
    Self {
      text: text.to_string(),
      kind,
    }
  }

  fn empty() -> Self {
    Self {
      text: String::new(),
      kind: LineKind::Empty,
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
  pub added:     usize,
  pub removed:   usize,
  pub unchanged: usize,
}

/// Two aligned columns. `left.len() == right.len()` always holds.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
  pub left:  Vec<DiffLine>,
  pub right: Vec<DiffLine>,
}

impl LineDiff {
  pub fn len(&self) -> usize {
    self.left.len()
  }

  pub fn is_empty(&self) -> bool {
    self.left.is_empty()
  }

  /// Whether both inputs had identical lines.
  pub fn is_unchanged(&self) -> bool {
    self
      .left
      .iter()
      .all(|line| line.kind == LineKind::Unchanged)
  }

  pub fn stats(&self) -> DiffStats {
    let mut stats = DiffStats::default();
    for line in &self.left {
      match line.kind {
        LineKind::Removed => stats.removed += 1,
        LineKind::Unchanged => stats.unchanged += 1,
        _ => {},
      }
    }
    stats.added = self
      .right
      .iter()
      .filter(|line| line.kind == LineKind::Added)
      .count();
    stats
  }

  /// Row pairs, for rendering the two columns side by side.
  pub fn rows(&self) -> impl Iterator<Item = (&DiffLine, &DiffLine)> {
    self.left.iter().zip(&self.right)
  }

  fn push_unchanged(&mut self, line: &str) {
    self.left.push(DiffLine::new(line, LineKind::Unchanged));
    self.right.push(DiffLine::new(line, LineKind::Unchanged));
  }

  fn push_removed(&mut self, line: &str) {
    self.left.push(DiffLine::new(line, LineKind::Removed));
    self.right.push(DiffLine::empty());
  }

  fn push_added(&mut self, line: &str) {
    self.left.push(DiffLine::empty());
    self.right.push(DiffLine::new(line, LineKind::Added));
  }
}

struct Lines<'a>(&'a [&'a str]);

impl<'a> imara_diff::TokenSource for Lines<'a> {
  type Token = &'a str;
  type Tokenizer = std::iter::Copied<std::slice::Iter<'a, &'a str>>;

  fn tokenize(&self) -> Self::Tokenizer {
    self.0.iter().copied()
  }

  fn estimate_tokens(&self) -> u32 {
    u32::try_from(self.0.len()).unwrap_or(u32::MAX)
  }
}

/// Split on `\n`. A single trailing empty segment is dropped, so `"a\n"` and
/// `"a"` both have one line and `""` has none.
pub fn split_lines(text: &str) -> Vec<&str> {
  let mut lines: Vec<&str> = text.split('\n').collect();
  if lines.last() == Some(&"") {
    lines.pop();
  }
  lines
}

pub fn compute_line_diff(before: &str, after: &str) -> LineDiff {
  let start = tracing::enabled!(tracing::Level::TRACE).then(Instant::now);
  let before_lines = split_lines(before);
  let after_lines = split_lines(after);

  let input = InternedInput::new(Lines(&before_lines), Lines(&after_lines));
  let mut diff = Diff::compute(Algorithm::Myers, &input);
  diff.postprocess_with_heuristic(
    &input,
    IndentHeuristic::new(|token| {
      IndentLevel::for_ascii_line(input.interner[token].bytes(), INDENT_WIDTH)
    }),
  );

  let mut out = LineDiff {
    left:  Vec::with_capacity(before_lines.len()),
    right: Vec::with_capacity(after_lines.len()),
  };
  let mut pos = 0usize;
  for Hunk { before, after } in diff.hunks() {
    let (start, end) = (before.start as usize, before.end as usize);
    for line in &before_lines[pos..start] {
      out.push_unchanged(line);
    }
    for line in &before_lines[start..end] {
      out.push_removed(line);
    }
    for line in &after_lines[after.start as usize..after.end as usize] {
      out.push_added(line);
    }
    pos = end;
  }
  for line in &before_lines[pos..] {
    out.push_unchanged(line);
  }

  if let Some(start) = start {
    tracing::trace!(
      lines = out.len(),
      "line diff took {}s",
      Instant::now().duration_since(start).as_secs_f64()
    );
  }
  out
}

/// Pretty-printed JSON with 2-space indentation.
pub fn normalize_json(value: &Value) -> String {
  pretty_json(value)
}

/// One tag per line.
pub fn normalize_markup(markup: &str) -> String {
  markup.replace("><", ">\n<").trim().to_string()
}

/// Both diffs shown for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDiff {
  pub document: LineDiff,
  pub rendered: LineDiff,
}

impl RecordDiff {
  pub fn for_record(record: &TransactionRecord) -> Self {
    let document = compute_line_diff(
      &normalize_json(&record.before.doc),
      &normalize_json(&record.after.doc),
    );

    let before = &record.before.rendered;
    let after = &record.after.rendered;
    // A structural fallback on either side makes markup comparison
    // meaningless, so compare structure on both.
    let rendered = if before.fallback || after.fallback {
      document.clone()
    } else {
      compute_line_diff(
        &normalize_markup(&before.text),
        &normalize_markup(&after.text),
      )
    };

    Self { document, rendered }
  }
}
