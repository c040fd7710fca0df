//! Drive an [`Inspector`] through a [`Timeline`] on a virtual clock.
//!
//! Every timer the inspector asks for fires at its exact deadline, so a run
//! is deterministic and takes no wall-clock time. [`crate::service`] drives
//! the same inputs with real timers.

use std::time::{
  Duration,
  Instant,
};

use serde::Serialize;
use the_lib::{
  classify::Category,
  config::Config,
  inspector::{
    Inspector,
    InspectorEvent,
  },
  lifecycle::StepChange,
  record::TransactionId,
};

use crate::script::{
  Input,
  Intent,
  Timeline,
};

/// Upper bound on timer firings while settling, in case a misbehaving
/// configuration keeps rescheduling.
const MAX_SETTLE_POLLS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
  Queued {
    id:       TransactionId,
    category: Category,
  },
  Flushed {
    ids: Vec<TransactionId>,
  },
  Step {
    from: Option<String>,
    to:   Option<String>,
  },
  Selected {
    id: Option<TransactionId>,
  },
  Cleared,
  AnimationToggled {
    enabled: bool,
  },
  Paused,
  Resumed,
  Replayed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
  pub at_ms: u64,
  #[serde(flatten)]
  pub event: TraceEvent,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Trace {
  entries: Vec<TraceEntry>,
}

impl Trace {
  pub fn push(&mut self, at: Duration, event: TraceEvent) {
    log::debug!("{:>6}ms {:?}", at.as_millis(), event);
    self.entries.push(TraceEntry {
      at_ms: at.as_millis() as u64,
      event,
    });
  }

  pub fn extend(&mut self, at: Duration, events: impl IntoIterator<Item = TraceEvent>) {
    for event in events {
      self.push(at, event);
    }
  }

  pub fn entries(&self) -> &[TraceEntry] {
    &self.entries
  }
}

/// Outcome of a run: the inspector in its final state and what happened.
#[derive(Debug)]
pub struct Run {
  pub inspector: Inspector,
  pub trace:     Trace,
  pub elapsed:   Duration,
}

fn step_label(inspector: &Inspector, step: Option<usize>) -> Option<String> {
  let steps = inspector.animation().steps();
  step.and_then(|step| steps.get(step)).map(|step| step.label.clone())
}

fn step_event(inspector: &Inspector, change: StepChange) -> TraceEvent {
  TraceEvent::Step {
    from: step_label(inspector, change.from),
    to:   step_label(inspector, change.to),
  }
}

/// Translate inspector events into trace events.
pub fn trace_events(inspector: &Inspector, events: Vec<InspectorEvent>) -> Vec<TraceEvent> {
  events
    .into_iter()
    .map(|event| {
      match event {
        InspectorEvent::Flushed { ids } => TraceEvent::Flushed { ids },
        InspectorEvent::Selected { id } => TraceEvent::Selected { id },
        InspectorEvent::Step(change) => step_event(inspector, change),
      }
    })
    .collect()
}

/// Feed one input to the inspector.
pub fn apply_input(inspector: &mut Inspector, input: Input, now: Instant) -> Vec<TraceEvent> {
  let mut out = Vec::new();
  match input {
    Input::Transaction(record) => {
      out.push(TraceEvent::Queued {
        id:       record.id,
        category: record.category,
      });
      inspector.on_transaction(*record, now);
    },
    Input::Intent(Intent::Select(target)) => {
      let latest = inspector.log().latest().map(|record| record.id);
      let events = inspector.select(target.resolve(latest));
      out.extend(trace_events(inspector, events));
    },
    Input::Intent(Intent::Replay) => {
      out.push(TraceEvent::Replayed);
      if let Some(change) = inspector.replay(now) {
        out.push(step_event(inspector, change));
      }
    },
    Input::Intent(Intent::ToggleAnimation) => {
      let enabled = inspector.toggle_animation();
      out.push(TraceEvent::AnimationToggled { enabled });
    },
    Input::Intent(Intent::Pause) => {
      if inspector.pause() {
        out.push(TraceEvent::Paused);
      }
    },
    Input::Intent(Intent::Resume) => {
      if inspector.resume(now) {
        out.push(TraceEvent::Resumed);
      }
    },
    Input::Intent(Intent::Highlight(step)) => {
      match inspector.highlight_step(step) {
        Some(change) => out.push(step_event(inspector, change)),
        None => log::warn!("no lifecycle step {step} to highlight"),
      }
    },
    Input::Intent(Intent::Clear) => {
      let events = inspector.clear();
      out.push(TraceEvent::Cleared);
      out.extend(trace_events(inspector, events));
    },
  }
  out
}

/// Fire every timer due at or before `until` (all of them for `None`), each
/// at its own deadline. Returns the deadline of the last one fired.
fn drain(
  inspector: &mut Inspector,
  trace: &mut Trace,
  start: Instant,
  until: Option<Instant>,
) -> Option<Instant> {
  let mut last = None;
  for _ in 0..MAX_SETTLE_POLLS {
    let Some(deadline) = inspector.next_deadline() else {
      return last;
    };
    if until.is_some_and(|until| deadline > until) {
      return last;
    }
    let events = inspector.poll(deadline);
    let events = trace_events(inspector, events);
    trace.extend(deadline.duration_since(start), events);
    last = Some(deadline);
  }
  log::warn!("timers kept firing; stopped after {MAX_SETTLE_POLLS} polls");
  last
}

/// Replay `timeline` on a virtual clock and let every timer run out.
pub fn run_virtual(config: Config, timeline: Timeline) -> Run {
  let mut inspector = Inspector::new(config);
  let mut trace = Trace::default();
  let start = Instant::now();

  for timed in timeline.inputs {
    let now = start + timed.at;
    drain(&mut inspector, &mut trace, start, Some(now));
    let events = apply_input(&mut inspector, timed.input, now);
    trace.extend(timed.at, events);
  }

  let settled = drain(&mut inspector, &mut trace, start, None);
  let elapsed = settled
    .map(|last| last.duration_since(start))
    .unwrap_or_default()
    .max(timeline.end);
  let events = inspector.teardown();
  let events = trace_events(&inspector, events);
  trace.extend(elapsed, events);

  log::info!(
    "virtual run finished after {}ms with {} records logged",
    elapsed.as_millis(),
    inspector.log().len()
  );
  Run {
    inspector,
    trace,
    elapsed,
  }
}
