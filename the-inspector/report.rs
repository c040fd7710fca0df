//! What a run leaves behind, as text or JSON.

use std::fmt::Write as _;

use serde::Serialize;
use the_lib::{
  classify::Category,
  diff::{
    DiffLine,
    DiffStats,
    LineDiff,
    LineKind,
    RecordDiff,
  },
  history::{
    Counters,
    Order,
  },
  inspector::LiveStats,
  lifecycle::AnimationState,
  record::{
    TransactionId,
    TransactionRecord,
  },
};

use crate::runner::{
  Run,
  Trace,
};

/// Width of one column of the side-by-side diff.
const DIFF_COLUMN: usize = 48;

#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
  pub id:           TransactionId,
  pub category:     Category,
  pub source:       String,
  pub steps:        String,
  pub chars_before: usize,
  pub chars_after:  usize,
  pub nodes:        usize,
  pub time:         String,
}

impl RecordRow {
  fn of(record: &TransactionRecord) -> Self {
    Self {
      id:           record.id,
      category:     record.category,
      source:       record.source.clone(),
      steps:        record.step_summary(),
      chars_before: record.before.char_count,
      chars_after:  record.after.char_count,
      nodes:        record.after.node_count,
      time:         record.timestamp.format("%H:%M:%S%.3f").to_string(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
  pub id:             TransactionId,
  pub document_stats: DiffStats,
  pub rendered_stats: DiffStats,
  #[serde(flatten)]
  pub diff:           RecordDiff,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
  pub elapsed_ms:  u64,
  pub order:       Order,
  pub records:     Vec<RecordRow>,
  pub pending:     usize,
  pub selected:    Option<TransactionId>,
  pub counters:    Counters,
  pub live:        Option<LiveStats>,
  pub animation:   AnimationState,
  pub active_step: Option<String>,
  pub trace:       Trace,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub diff:        Option<DiffReport>,
}

impl Report {
  pub fn new(run: Run, diff: Option<TransactionId>) -> Self {
    let inspector = &run.inspector;
    let order = inspector.config().inspector.order;
    let diff = diff.and_then(|id| {
      let report = inspector.diff(id).map(|diff| {
        DiffReport {
          id,
          document_stats: diff.document.stats(),
          rendered_stats: diff.rendered.stats(),
          diff,
        }
      });
      if report.is_none() {
        log::warn!("record {id} is not in the log; no diff to show");
      }
      report
    });

    Self {
      elapsed_ms: run.elapsed.as_millis() as u64,
      order,
      records: inspector.log().iter(order).map(RecordRow::of).collect(),
      pending: inspector.pending_len(),
      selected: inspector.log().selected_id(),
      counters: *inspector.counters(),
      live: inspector.live_stats(),
      animation: inspector.animation_state(),
      active_step: inspector
        .animation()
        .current()
        .map(|step| step.label.clone()),
      diff,
      trace: run.trace,
    }
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }

  pub fn to_text(&self) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = self.write_text(&mut out);
    out
  }

  fn write_text(&self, out: &mut String) -> std::fmt::Result {
    writeln!(
      out,
      "Transactions ({}, {})",
      self.records.len(),
      match self.order {
        Order::NewestFirst => "newest first",
        Order::OldestFirst => "oldest first",
      }
    )?;
    for row in &self.records {
      let marker = if Some(row.id) == self.selected { '>' } else { ' ' };
      writeln!(
        out,
        "{marker}{:>5} {:<9} {:<24} {:<20} chars {:>3} -> {:<3} nodes {:>3}  {}",
        row.id.to_string(),
        row.category.as_str(),
        truncate(&row.source, 24),
        truncate(&row.steps, 20),
        row.chars_before,
        row.chars_after,
        row.nodes,
        row.time,
      )?;
    }
    if self.pending > 0 {
      writeln!(out, "  ({} queued, not yet flushed)", self.pending)?;
    }

    writeln!(out)?;
    writeln!(out, "Counters")?;
    writeln!(out, "  total     {:>5}", self.counters.total)?;
    for category in Category::ALL {
      writeln!(
        out,
        "  {:<9} {:>5}",
        category.as_str(),
        self.counters.count(category)
      )?;
    }

    writeln!(out)?;
    match (&self.live, self.selected) {
      (Some(live), Some(_)) => writeln!(out, "Inspecting {}", live.id)?,
      (Some(live), None) => writeln!(out, "Live (latest {})", live.id)?,
      (None, _) => writeln!(out, "Live (no transactions yet)")?,
    }
    if let Some(live) = &self.live {
      writeln!(
        out,
        "  version {}  chars {}  nodes {}  marks {}",
        live.version,
        live.char_count,
        live.node_count,
        if live.active_marks.is_empty() {
          "-".to_string()
        } else {
          live.active_marks.join(", ")
        }
      )?;
      let selection = &live.selection;
      writeln!(
        out,
        "  selection {}..{} {:?} {:?}",
        selection.from, selection.to, selection.kind, selection.text
      )?;
    }
    writeln!(
      out,
      "  lifecycle {}",
      self.active_step.as_deref().unwrap_or("idle")
    )?;

    writeln!(out)?;
    writeln!(out, "Trace ({}ms)", self.elapsed_ms)?;
    for entry in self.trace.entries() {
      writeln!(out, "  {:>6}ms  {:?}", entry.at_ms, entry.event)?;
    }

    if let Some(diff) = &self.diff {
      writeln!(out)?;
      writeln!(out, "Document diff of {}", diff.id)?;
      write_columns(out, &diff.diff.document)?;
      writeln!(out)?;
      writeln!(out, "Rendered diff of {}", diff.id)?;
      write_columns(out, &diff.diff.rendered)?;
    }
    Ok(())
  }
}

fn marker(line: &DiffLine) -> char {
  match line.kind {
    LineKind::Added => '+',
    LineKind::Removed => '-',
    LineKind::Unchanged | LineKind::Empty => ' ',
  }
}

fn write_columns(out: &mut String, diff: &LineDiff) -> std::fmt::Result {
  if diff.is_unchanged() {
    writeln!(out, "  (no changes)")?;
  }
  for (left, right) in diff.rows() {
    writeln!(
      out,
      "{} {:<width$} | {} {}",
      marker(left),
      truncate(&left.text, DIFF_COLUMN),
      marker(right),
      right.text,
      width = DIFF_COLUMN,
    )?;
  }
  Ok(())
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
fn truncate(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    return text.to_string();
  }
  let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
  out.push('…');
  out
}
