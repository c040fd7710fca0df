//! Debounced batching of transaction records.
//!
//! Records are queued as they are built. Every push re-arms the single quiet
//! timer, so a burst of typing produces one [`Batch`] once input pauses for
//! the configured quiet period. Records keep the order they were pushed in.

use std::time::{
  Duration,
  Instant,
};

use crate::{
  record::TransactionRecord,
  snapshot::Snapshot,
  timer::Timer,
};

/// Quiet period used by the inspector views.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(500);

/// A non-empty, ordered group of records delivered together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
  records: Vec<TransactionRecord>,
}

impl Batch {
  fn new(records: Vec<TransactionRecord>) -> Option<Self> {
    (!records.is_empty()).then_some(Self { records })
  }

  pub fn records(&self) -> &[TransactionRecord] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn latest(&self) -> &TransactionRecord {
    // Batches are only constructed from non-empty queues.
    &self.records[self.records.len() - 1]
  }

  /// Document state after the last transaction of the batch.
  pub fn end_state(&self) -> &Snapshot {
    &self.latest().after
  }

  pub fn into_records(self) -> Vec<TransactionRecord> {
    self.records
  }
}

#[derive(Debug)]
pub struct Coalescer {
  quiet:   Duration,
  pending: Vec<TransactionRecord>,
  timer:   Timer,
}

impl Default for Coalescer {
  fn default() -> Self {
    Self::new(DEFAULT_QUIET)
  }
}

impl Coalescer {
  pub fn new(quiet: Duration) -> Self {
    Self {
      quiet,
      pending: Vec::new(),
      timer: Timer::new(),
    }
  }

  pub fn quiet(&self) -> Duration {
    self.quiet
  }

  /// Queue a record and restart the quiet period. Returns the new deadline.
  pub fn push(&mut self, record: TransactionRecord, now: Instant) -> Instant {
    self.pending.push(record);
    self.timer.arm_after(now, self.quiet)
  }

  /// Deliver the queue if the quiet period has elapsed.
  pub fn poll(&mut self, now: Instant) -> Option<Batch> {
    if self.timer.fire(now) {
      self.take()
    } else {
      None
    }
  }

  /// Deliver the queue immediately, regardless of the timer.
  pub fn flush(&mut self) -> Option<Batch> {
    self.timer.cancel();
    self.take()
  }

  /// Drop queued records and disarm the timer.
  pub fn cancel(&mut self) -> usize {
    self.timer.cancel();
    let dropped = self.pending.len();
    self.pending.clear();
    dropped
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.timer.deadline()
  }

  pub fn pending_len(&self) -> usize {
    self.pending.len()
  }

  pub fn pending(&self) -> &[TransactionRecord] {
    &self.pending
  }

  fn take(&mut self) -> Option<Batch> {
    Batch::new(std::mem::take(&mut self.pending))
  }
}
