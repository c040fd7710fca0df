//! Inline formatting as sorted, non-overlapping spans per mark.

use smallvec::SmallVec;

use crate::Tendril;

/// Marks applying to one character, sorted by name.
pub type MarkSet = SmallVec<[Tendril; 2]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkSpan {
  pub mark: Tendril,
  pub from: usize,
  pub to:   usize,
}

/// All mark spans of a document. Spans of the same mark never overlap or
/// touch; every mutation restores that before returning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Marks {
  spans: Vec<MarkSpan>,
}

impl Marks {
  pub fn spans(&self) -> &[MarkSpan] {
    &self.spans
  }

  pub fn is_empty(&self) -> bool {
    self.spans.is_empty()
  }

  /// Marks covering the character at `pos`.
  pub fn at(&self, pos: usize) -> MarkSet {
    let mut set: MarkSet = self
      .spans
      .iter()
      .filter(|span| span.from <= pos && pos < span.to)
      .map(|span| span.mark.clone())
      .collect();
    set.sort();
    set.dedup();
    set
  }

  /// Whether every character in `from..to` carries `mark`.
  pub fn covers(&self, from: usize, to: usize, mark: &str) -> bool {
    self
      .spans
      .iter()
      .any(|span| span.mark.as_str() == mark && span.from <= from && to <= span.to)
  }

  pub fn add(&mut self, from: usize, to: usize, mark: &str) {
    if from < to {
      self.spans.push(MarkSpan {
        mark: mark.into(),
        from,
        to,
      });
      self.normalize();
    }
  }

  pub fn remove(&mut self, from: usize, to: usize, mark: &str) {
    let mut kept = Vec::with_capacity(self.spans.len() + 1);
    for span in self.spans.drain(..) {
      if span.mark.as_str() != mark || span.to <= from || to <= span.from {
        kept.push(span);
        continue;
      }
      if span.from < from {
        kept.push(MarkSpan {
          mark: span.mark.clone(),
          from: span.from,
          to:   from,
        });
      }
      if to < span.to {
        kept.push(MarkSpan {
          mark: span.mark,
          from: to,
          to:   span.to,
        });
      }
    }
    self.spans = kept;
    self.normalize();
  }

  /// Make room for `len` characters inserted at `at`. Spans strictly
  /// containing `at` grow; spans starting at or after it move.
  pub fn shift_insert(&mut self, at: usize, len: usize) {
    for span in &mut self.spans {
      if span.from >= at {
        span.from += len;
        span.to += len;
      } else if span.to > at {
        span.to += len;
      }
    }
  }

  /// Collapse `from..to` after its characters were removed.
  pub fn shift_delete(&mut self, from: usize, to: usize) {
    let map = |pos: usize| {
      if pos <= from {
        pos
      } else if pos >= to {
        pos - (to - from)
      } else {
        from
      }
    };
    for span in &mut self.spans {
      span.from = map(span.from);
      span.to = map(span.to);
    }
    self.normalize();
  }

  /// Give the characters in `from..to` exactly the marks in `set`.
  pub fn assign(&mut self, from: usize, to: usize, set: &[Tendril]) {
    let present: MarkSet = self
      .spans
      .iter()
      .map(|span| span.mark.clone())
      .collect();
    for mark in present {
      if !set.contains(&mark) {
        self.remove(from, to, &mark);
      }
    }
    for mark in set {
      self.add(from, to, mark);
    }
  }

  fn normalize(&mut self) {
    self.spans.retain(|span| span.from < span.to);
    self
      .spans
      .sort_by(|a, b| a.mark.cmp(&b.mark).then(a.from.cmp(&b.from)));
    let mut merged: Vec<MarkSpan> = Vec::with_capacity(self.spans.len());
    for span in self.spans.drain(..) {
      match merged.last_mut() {
        Some(last) if last.mark == span.mark && span.from <= last.to => {
          last.to = last.to.max(span.to);
        },
        _ => merged.push(span),
      }
    }
    self.spans = merged;
  }
}

/// Opening and closing tag for a mark, or `None` for marks with no markup.
pub fn tags(mark: &str) -> Option<(&'static str, &'static str)> {
  match mark {
    "strong" => Some(("<strong>", "</strong>")),
    "em" => Some(("<em>", "</em>")),
    "code" => Some(("<code>", "</code>")),
    "underline" => Some(("<u>", "</u>")),
    "strike" => Some(("<s>", "</s>")),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spans(marks: &Marks) -> Vec<(&str, usize, usize)> {
    marks
      .spans()
      .iter()
      .map(|span| (span.mark.as_str(), span.from, span.to))
      .collect()
  }

  #[test]
  fn add_merges_touching_spans() {
    let mut marks = Marks::default();
    marks.add(0, 2, "strong");
    marks.add(2, 4, "strong");
    marks.add(1, 3, "em");
    assert_eq!(spans(&marks), vec![("em", 1, 3), ("strong", 0, 4)]);
    assert!(marks.covers(1, 4, "strong"));
    assert!(!marks.covers(0, 4, "em"));
    let at = marks.at(1);
    let at: Vec<&str> = at.iter().map(|mark| mark.as_str()).collect();
    assert_eq!(at, ["em", "strong"]);
  }

  #[test]
  fn remove_splits_spans() {
    let mut marks = Marks::default();
    marks.add(0, 6, "strong");
    marks.remove(2, 4, "strong");
    assert_eq!(spans(&marks), vec![("strong", 0, 2), ("strong", 4, 6)]);
  }

  #[test]
  fn edits_move_spans() {
    let mut marks = Marks::default();
    marks.add(2, 4, "em");
    marks.shift_insert(3, 2);
    assert_eq!(spans(&marks), vec![("em", 2, 6)]);
    marks.shift_insert(2, 1);
    assert_eq!(spans(&marks), vec![("em", 3, 7)]);
    marks.shift_delete(0, 4);
    assert_eq!(spans(&marks), vec![("em", 0, 3)]);
    marks.shift_delete(0, 3);
    assert!(marks.is_empty());
  }

  #[test]
  fn assign_replaces_the_mark_set() {
    let mut marks = Marks::default();
    marks.add(0, 4, "em");
    marks.assign(1, 2, &["strong".into()]);
    assert_eq!(
      spans(&marks),
      vec![("em", 0, 1), ("em", 2, 4), ("strong", 1, 2)]
    );
  }
}
