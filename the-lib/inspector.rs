//! The inspector: queue, log, counters and animator behind one owner.
//!
//! [`Inspector`] is the only type that writes to the log and the counters,
//! and it only does so on the flush path. Everything time-dependent takes an
//! explicit `now`, and [`Inspector::next_deadline`] tells the driver when to
//! call [`Inspector::poll`] next. A driver can be a test stepping a virtual
//! clock or an async task sleeping until the deadline.

use std::time::Instant;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  coalesce::{
    Batch,
    Coalescer,
  },
  config::Config,
  diff::RecordDiff,
  history::{
    Counters,
    TransactionLog,
  },
  lifecycle::{
    AnimationState,
    Animator,
    StepChange,
  },
  record::{
    TransactionId,
    TransactionRecord,
  },
  snapshot::SelectionDescriptor,
  timer::earliest,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InspectorEvent {
  /// A batch reached the log.
  Flushed { ids: Vec<TransactionId> },
  /// The inspected record changed. `None` follows live state.
  Selected { id: Option<TransactionId> },
  /// The active lifecycle step changed.
  Step(StepChange),
}

/// Document statistics of the inspected record's end state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
  pub id:           TransactionId,
  pub version:      u64,
  pub char_count:   usize,
  pub node_count:   usize,
  pub selection:    SelectionDescriptor,
  pub active_marks: Vec<String>,
  pub has_marks:    bool,
}

impl LiveStats {
  pub fn of(record: &TransactionRecord) -> Self {
    let after = &record.after;
    Self {
      id:           record.id,
      version:      after.version,
      char_count:   after.char_count,
      node_count:   after.node_count,
      selection:    after.selection.clone(),
      active_marks: after.active_marks.clone(),
      has_marks:    after.has_marks,
    }
  }
}

#[derive(Debug)]
pub struct Inspector {
  config:    Config,
  coalescer: Coalescer,
  log:       TransactionLog,
  counters:  Counters,
  animator:  Animator,
}

impl Default for Inspector {
  fn default() -> Self {
    Self::new(Config::default())
  }
}

impl Inspector {
  pub fn new(config: Config) -> Self {
    let mut animator = Animator::new(
      config.lifecycle.steps.clone(),
      config.lifecycle.restart_delay(),
    );
    animator.set_enabled(config.lifecycle.enabled);
    Self {
      coalescer: Coalescer::new(config.inspector.debounce()),
      log: TransactionLog::with_capacity(config.inspector.capacity),
      counters: Counters::default(),
      animator,
      config,
    }
  }

  /// Queue a freshly built record. Returns the flush deadline.
  pub fn on_transaction(&mut self, record: TransactionRecord, now: Instant) -> Instant {
    tracing::trace!(id = %record.id, category = %record.category, "queued transaction");
    self.coalescer.push(record, now)
  }

  /// Run every timer that is due at `now`.
  pub fn poll(&mut self, now: Instant) -> Vec<InspectorEvent> {
    let mut events = Vec::new();
    if let Some(batch) = self.coalescer.poll(now) {
      self.deliver(batch, now, &mut events);
    }
    if let Some(change) = self.animator.poll(now) {
      events.push(InspectorEvent::Step(change));
    }
    events
  }

  /// Flush the queue without waiting for the quiet period.
  pub fn flush_now(&mut self, now: Instant) -> Vec<InspectorEvent> {
    let mut events = Vec::new();
    if let Some(batch) = self.coalescer.flush() {
      self.deliver(batch, now, &mut events);
    }
    events
  }

  fn deliver(&mut self, batch: Batch, now: Instant, events: &mut Vec<InspectorEvent>) {
    let ids = batch.records().iter().map(|record| record.id).collect();
    let end = batch.end_state();
    tracing::debug!(
      records = batch.len(),
      version = end.version,
      chars = end.char_count,
      "flushing transaction batch"
    );
    let evicted = self.log.append(batch, &mut self.counters);
    if evicted > 0 {
      tracing::trace!(evicted, "log at capacity");
    }
    events.push(InspectorEvent::Flushed { ids });
    if let Some(change) = self.animator.trigger(now) {
      events.push(InspectorEvent::Step(change));
    }
  }

  /// Inspect a record, or follow live state with `None`. Inspecting a record
  /// stops the automatic animation.
  pub fn select(&mut self, id: Option<TransactionId>) -> Vec<InspectorEvent> {
    let selected = self.log.select(id);
    if id.is_some() && selected.is_none() {
      tracing::debug!(?id, "selected record is not in the log");
    }
    let mut events = vec![InspectorEvent::Selected { id: selected }];
    if selected.is_some() {
      events.extend(self.animator.interrupt().map(InspectorEvent::Step));
    }
    events
  }

  /// Drop the log, the counters, queued records and any running animation.
  pub fn clear(&mut self) -> Vec<InspectorEvent> {
    self.coalescer.cancel();
    self.log.clear(&mut self.counters);
    self.animator.interrupt().map(InspectorEvent::Step).into_iter().collect()
  }

  pub fn replay(&mut self, now: Instant) -> Option<StepChange> {
    self.animator.replay(now)
  }

  /// Returns whether flushes now trigger the animation.
  pub fn toggle_animation(&mut self) -> bool {
    self.animator.toggle_enabled()
  }

  pub fn interrupt(&mut self) -> Option<StepChange> {
    self.animator.interrupt()
  }

  pub fn pause(&mut self) -> bool {
    self.animator.pause()
  }

  pub fn resume(&mut self, now: Instant) -> bool {
    self.animator.resume(now)
  }

  pub fn highlight_step(&mut self, step: usize) -> Option<StepChange> {
    self.animator.highlight(step)
  }

  /// Cancel every pending timer. Queued records are discarded.
  pub fn teardown(&mut self) -> Vec<InspectorEvent> {
    let dropped = self.coalescer.cancel();
    if dropped > 0 {
      tracing::debug!(dropped, "discarding queued records on teardown");
    }
    self.animator.interrupt().map(InspectorEvent::Step).into_iter().collect()
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    earliest(self.coalescer.deadline(), self.animator.next_deadline())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn log(&self) -> &TransactionLog {
    &self.log
  }

  pub fn counters(&self) -> &Counters {
    &self.counters
  }

  pub fn pending_len(&self) -> usize {
    self.coalescer.pending_len()
  }

  pub fn animation(&self) -> &Animator {
    &self.animator
  }

  pub fn animation_state(&self) -> AnimationState {
    self.animator.state()
  }

  pub fn active_step(&self) -> Option<usize> {
    self.animator.active_step()
  }

  pub fn inspected(&self) -> Option<&TransactionRecord> {
    self.log.inspected()
  }

  pub fn diff(&self, id: TransactionId) -> Option<RecordDiff> {
    self.log.get(id).map(RecordDiff::for_record)
  }

  pub fn live_stats(&self) -> Option<LiveStats> {
    self.inspected().map(LiveStats::of)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::{
    history::Order,
    record::{
      RecordBuilder,
      tests::{
        selection_record,
        text_record,
      },
    },
  };

  fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
  }

  fn type_chars(
    inspector: &mut Inspector,
    builder: &mut RecordBuilder,
    t0: Instant,
    n: usize,
  ) -> Vec<TransactionId> {
    let mut text = String::new();
    (0..n)
      .map(|i| {
        let before = text.clone();
        text.push('a');
        let record = text_record(builder, &before, &text);
        let id = record.id;
        inspector.on_transaction(record, t0 + ms(i as u64 * 100));
        id
      })
      .collect()
  }

  #[test]
  fn flush_appends_counts_and_triggers() {
    let t0 = Instant::now();
    let mut inspector = Inspector::default();
    let mut builder = RecordBuilder::new();
    let ids = type_chars(&mut inspector, &mut builder, t0, 3);

    assert!(inspector.poll(t0 + ms(400)).is_empty());
    assert_eq!(inspector.next_deadline(), Some(t0 + ms(700)));

    let events = inspector.poll(t0 + ms(700));
    assert_eq!(
      events,
      vec![
        InspectorEvent::Flushed { ids: ids.clone() },
        InspectorEvent::Step(StepChange {
          from: None,
          to:   Some(0),
        }),
      ]
    );
    assert_eq!(inspector.counters().total, 3);
    assert_eq!(inspector.log().len(), 3);
    assert_eq!(inspector.active_step(), Some(0));

    let stats = inspector.live_stats().expect("log has records");
    assert_eq!(stats.id, ids[2]);
    assert_eq!(stats.char_count, 3);
  }

  #[test]
  fn selecting_a_record_interrupts_the_animation() {
    let t0 = Instant::now();
    let mut inspector = Inspector::default();
    let mut builder = RecordBuilder::new();
    let ids = type_chars(&mut inspector, &mut builder, t0, 2);
    inspector.flush_now(t0);
    assert_eq!(inspector.active_step(), Some(0));

    assert_eq!(
      inspector.select(Some(TransactionId::new(u64::MAX))),
      vec![InspectorEvent::Selected { id: None }]
    );
    assert_eq!(inspector.active_step(), Some(0));

    assert_eq!(inspector.select(Some(ids[0])), vec![
      InspectorEvent::Selected { id: Some(ids[0]) },
      InspectorEvent::Step(StepChange {
        from: Some(0),
        to:   None,
      }),
    ]);
    assert_eq!(inspector.active_step(), None);
    assert_eq!(inspector.live_stats().map(|s| s.char_count), Some(1));
    assert!(inspector.diff(ids[0]).is_some());

    inspector.select(None);
    assert_eq!(inspector.inspected().map(|r| r.id), Some(ids[1]));
  }

  #[test]
  fn disabled_animation_still_records() {
    let t0 = Instant::now();
    let mut inspector = Inspector::default();
    assert!(!inspector.toggle_animation());
    let mut builder = RecordBuilder::new();
    inspector.on_transaction(selection_record(&mut builder, 1, 4), t0);

    let events = inspector.poll(t0 + ms(500));
    assert_eq!(events.len(), 1);
    assert_eq!(inspector.counters().selection_changes, 1);
    assert_eq!(inspector.active_step(), None);

    assert!(inspector.replay(t0 + ms(500)).is_some());
  }

  #[test]
  fn teardown_and_clear_leave_no_timers() {
    let t0 = Instant::now();
    let mut inspector = Inspector::new(Config::compact());
    let mut builder = RecordBuilder::new();
    type_chars(&mut inspector, &mut builder, t0, 12);
    inspector.flush_now(t0 + ms(1200));
    assert_eq!(inspector.log().len(), 10);
    assert_eq!(inspector.config().inspector.order, Order::OldestFirst);

    assert_eq!(inspector.active_step(), Some(0));
    type_chars(&mut inspector, &mut builder, t0, 1);
    assert_eq!(inspector.teardown(), vec![InspectorEvent::Step(StepChange {
      from: Some(0),
      to:   None,
    })]);
    assert_eq!(inspector.next_deadline(), None);
    assert_eq!(inspector.pending_len(), 0);

    inspector.replay(t0 + ms(1300));
    assert_eq!(inspector.clear(), vec![InspectorEvent::Step(StepChange {
      from: Some(0),
      to:   None,
    })]);
    assert!(inspector.clear().is_empty());
    assert!(inspector.log().is_empty());
    assert_eq!(inspector.counters(), &Counters::default());
    assert!(inspector.poll(t0 + Duration::from_secs(60)).is_empty());
  }
}
