//! Live introspection of edit transactions.
//!
//! An engine reports each applied transaction as an [`engine::EditEvent`].
//! [`record::RecordBuilder`] classifies it and snapshots both states into an
//! immutable [`record::TransactionRecord`]. The [`inspector::Inspector`]
//! debounces records into batches, appends them to a bounded
//! [`history::TransactionLog`], keeps per-category [`history::Counters`] and
//! drives the [`lifecycle::Animator`]. Diffs between the two snapshots of a
//! record are computed on demand by [`diff::RecordDiff`].

pub mod classify;
pub mod coalesce;
pub mod config;
pub mod diff;
pub mod engine;
pub mod history;
pub mod inspector;
pub mod lifecycle;
pub mod record;
pub mod snapshot;
pub mod timer;
