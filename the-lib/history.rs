//! Bounded log of recent transaction records.
//!
//! The log is a fixed-capacity append log in flush order: new records are
//! pushed at the back, the oldest ones are evicted from the front. Views
//! that list newest first iterate with [`Order::NewestFirst`]; eviction never
//! depends on display order.
//!
//! The log also tracks which record is being inspected. `None` means the
//! inspector follows the live document, i.e. shows the latest record.

use std::collections::VecDeque;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  classify::Category,
  coalesce::Batch,
  record::{
    TransactionId,
    TransactionRecord,
  },
};

/// Capacity of the full visualizer view.
pub const DEFAULT_CAPACITY: usize = 60;
/// Capacity of the compact flow view.
pub const COMPACT_CAPACITY: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
  #[default]
  NewestFirst,
  OldestFirst,
}

/// Running totals of flushed records. Only ever reset by an explicit clear.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
  pub total:             u64,
  pub document_edits:    u64,
  pub selection_changes: u64,
  pub mark_edits:        u64,
  pub history_ops:       u64,
  pub meta:              u64,
}

impl Counters {
  pub fn record(&mut self, category: Category) {
    self.total += 1;
    *self.slot(category) += 1;
  }

  pub fn count(&self, category: Category) -> u64 {
    match category {
      Category::DocumentEdit => self.document_edits,
      Category::SelectionOnly => self.selection_changes,
      Category::MarkEdit => self.mark_edits,
      Category::HistoryOp => self.history_ops,
      Category::Meta => self.meta,
    }
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  fn slot(&mut self, category: Category) -> &mut u64 {
    match category {
      Category::DocumentEdit => &mut self.document_edits,
      Category::SelectionOnly => &mut self.selection_changes,
      Category::MarkEdit => &mut self.mark_edits,
      Category::HistoryOp => &mut self.history_ops,
      Category::Meta => &mut self.meta,
    }
  }
}

#[derive(Debug, Clone)]
pub struct TransactionLog {
  records:  VecDeque<TransactionRecord>,
  capacity: usize,
  selected: Option<TransactionId>,
}

impl Default for TransactionLog {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }
}

impl TransactionLog {
  /// A capacity of zero is raised to one.
  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      records: VecDeque::with_capacity(capacity),
      capacity,
      selected: None,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Append a flushed batch, counting each record once. Returns the number of
  /// records evicted to stay within capacity.
  pub fn append(&mut self, batch: Batch, counters: &mut Counters) -> usize {
    let mut evicted = 0;
    for record in batch.into_records() {
      counters.record(record.category);
      self.records.push_back(record);
      if self.records.len() > self.capacity {
        if let Some(old) = self.records.pop_front() {
          evicted += 1;
          if self.selected == Some(old.id) {
            tracing::debug!(id = %old.id, "inspected record evicted, following live state");
            self.selected = None;
          }
        }
      }
    }
    evicted
  }

  /// Inspect a record, or follow live state with `None`. An id that is not
  /// in the log behaves like `None`. Returns the resulting selection.
  pub fn select(&mut self, id: Option<TransactionId>) -> Option<TransactionId> {
    self.selected = id.filter(|id| self.get(*id).is_some());
    self.selected
  }

  pub fn selected_id(&self) -> Option<TransactionId> {
    self.selected
  }

  pub fn get(&self, id: TransactionId) -> Option<&TransactionRecord> {
    self.records.iter().find(|record| record.id == id)
  }

  pub fn latest(&self) -> Option<&TransactionRecord> {
    self.records.back()
  }

  /// The selected record, or the latest when following live state.
  pub fn inspected(&self) -> Option<&TransactionRecord> {
    match self.selected {
      Some(id) => self.get(id),
      None => self.latest(),
    }
  }

  pub fn iter(&self, order: Order) -> Box<dyn Iterator<Item = &TransactionRecord> + '_> {
    match order {
      Order::NewestFirst => Box::new(self.records.iter().rev()),
      Order::OldestFirst => Box::new(self.records.iter()),
    }
  }

  pub fn clear(&mut self, counters: &mut Counters) {
    self.records.clear();
    self.selected = None;
    counters.reset();
  }
}

#[cfg(test)]
mod tests {
  use std::time::{
    Duration,
    Instant,
  };

  use super::*;
  use crate::{
    coalesce::Coalescer,
    record::{
      RecordBuilder,
      tests::{
        selection_record,
        text_record,
      },
    },
  };

  fn batch_of(records: Vec<TransactionRecord>) -> Batch {
    let now = Instant::now();
    let mut coalescer = Coalescer::new(Duration::ZERO);
    for record in records {
      coalescer.push(record, now);
    }
    coalescer.flush().expect("non-empty batch")
  }

  fn records(builder: &mut RecordBuilder, n: usize) -> Vec<TransactionRecord> {
    (0..n)
      .map(|i| text_record(builder, &"a".repeat(i), &"a".repeat(i + 1)))
      .collect()
  }

  quickcheck::quickcheck! {
    fn keeps_the_most_recent_records(capacity: u8, extra: u8) -> bool {
      let capacity = usize::from(capacity % 16) + 1;
      let extra = usize::from(extra % 16);
      let mut builder = RecordBuilder::new();
      let all = records(&mut builder, capacity + extra);
      let expected: Vec<_> = all[extra..].iter().map(|r| r.id).collect();

      let mut log = TransactionLog::with_capacity(capacity);
      let mut counters = Counters::default();
      log.append(batch_of(all), &mut counters);

      let kept: Vec<_> = log.iter(Order::OldestFirst).map(|r| r.id).collect();
      kept == expected && counters.total == (capacity + extra) as u64
    }
  }

  #[test]
  fn newest_first_is_a_view() {
    let mut builder = RecordBuilder::new();
    let mut log = TransactionLog::with_capacity(3);
    let mut counters = Counters::default();
    let batch = records(&mut builder, 4);
    let ids: Vec<_> = batch.iter().map(|r| r.id).collect();
    assert_eq!(log.append(batch_of(batch), &mut counters), 1);

    let newest: Vec<_> = log.iter(Order::NewestFirst).map(|r| r.id).collect();
    assert_eq!(newest, vec![ids[3], ids[2], ids[1]]);
    assert_eq!(log.latest().map(|r| r.id), Some(ids[3]));
  }

  #[test]
  fn selection_fails_soft() {
    let mut builder = RecordBuilder::new();
    let mut log = TransactionLog::default();
    let mut counters = Counters::default();
    let batch = records(&mut builder, 2);
    let first = batch[0].id;
    log.append(batch_of(batch), &mut counters);

    assert_eq!(log.select(Some(first)), Some(first));
    assert_eq!(log.inspected().map(|r| r.id), Some(first));

    assert_eq!(log.select(Some(TransactionId::new(u64::MAX))), None);
    assert_eq!(log.selected_id(), None);
    assert_eq!(log.inspected().map(|r| r.id), log.latest().map(|r| r.id));
  }

  #[test]
  fn lookup_does_not_rely_on_id_order() {
    let mut builder = RecordBuilder::new();
    let mut log = TransactionLog::default();
    let mut counters = Counters::default();
    let mut batch = records(&mut builder, 3);
    batch[0].id = TransactionId::new(900);
    batch[1].id = TransactionId::new(500);
    batch[2].id = TransactionId::new(700);
    log.append(batch_of(batch), &mut counters);

    for id in [900, 500, 700] {
      let id = TransactionId::new(id);
      assert_eq!(log.get(id).map(|r| r.id), Some(id));
    }
    assert_eq!(log.select(Some(TransactionId::new(500))), Some(TransactionId::new(500)));
  }

  #[test]
  fn evicting_the_selection_returns_to_live() {
    let mut builder = RecordBuilder::new();
    let mut log = TransactionLog::with_capacity(1);
    let mut counters = Counters::default();
    let first = records(&mut builder, 1);
    let id = first[0].id;
    log.append(batch_of(first), &mut counters);
    log.select(Some(id));

    log.append(batch_of(records(&mut builder, 1)), &mut counters);
    assert_eq!(log.selected_id(), None);
    assert!(log.get(id).is_none());
  }

  #[test]
  fn counters_track_categories_until_clear() {
    let mut builder = RecordBuilder::new();
    let mut log = TransactionLog::default();
    let mut counters = Counters::default();
    let mut batch = records(&mut builder, 2);
    batch.push(selection_record(&mut builder, 1, 4));
    log.append(batch_of(batch), &mut counters);

    assert_eq!(counters.total, 3);
    assert_eq!(counters.count(Category::DocumentEdit), 2);
    assert_eq!(counters.count(Category::SelectionOnly), 1);
    assert_eq!(counters.count(Category::MarkEdit), 0);

    log.clear(&mut counters);
    assert!(log.is_empty());
    assert_eq!(counters, Counters::default());

    // Clearing an empty log is fine.
    log.clear(&mut counters);
  }
}
