//! Per-item lifecycle tracking for a batch run.
//!
//! Each in-flight or settled submission has one [`MutationRecord`] keyed by
//! the item's local id. Records are overwritten, never accumulated, so an
//! id has at most one record at a time. [`StatusRegistry::snapshot`] is a
//! pure read filtered to the ids the caller passes in, which automatically
//! excludes stale records from an earlier batch.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::types::{AggregateResult, ItemKind};

/// Lifecycle state of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Submission started and has not settled.
    Pending,
    /// Submission settled successfully.
    Success,
    /// Submission settled in error.
    Error,
}

/// One in-flight or completed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    /// Current lifecycle state.
    pub status: MutationStatus,
    /// When the submission started.
    pub started_at: DateTime<Utc>,
    /// When the submission settled, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

/// In-memory map from item id to submission state.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    records: DashMap<String, MutationRecord>,
}

impl StatusRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id`'s submission has started.
    pub fn record_pending(&self, id: &str) {
        self.records.insert(
            id.to_string(),
            MutationRecord {
                status: MutationStatus::Pending,
                started_at: Utc::now(),
                ended_at: None,
            },
        );
    }

    /// Record that `id`'s submission settled successfully.
    pub fn record_success(&self, id: &str) {
        self.settle(id, MutationStatus::Success);
    }

    /// Record that `id`'s submission settled in error.
    pub fn record_error(&self, id: &str) {
        self.settle(id, MutationStatus::Error);
    }

    fn settle(&self, id: &str, status: MutationStatus) {
        let mut entry = self.records.entry(id.to_string()).or_insert(MutationRecord {
            status,
            started_at: Utc::now(),
            ended_at: None,
        });
        entry.status = status;
        entry.ended_at = Some(Utc::now());
    }

    /// The current record for `id`, if any.
    pub fn record(&self, id: &str) -> Option<MutationRecord> {
        self.records.get(id).map(|r| *r)
    }

    /// Derive the aggregate view for the given selection.
    ///
    /// `complete` is true iff every selected id has a terminal record.
    /// Records for ids outside the selection are ignored.
    pub fn snapshot<'a, I>(&self, selected: I) -> AggregateResult
    where
        I: IntoIterator<Item = (&'a str, ItemKind)>,
    {
        let mut result = AggregateResult {
            complete: true,
            ..AggregateResult::default()
        };
        let mut selected_count = 0usize;

        for (id, kind) in selected {
            selected_count += 1;
            match self.records.get(id).map(|r| r.status) {
                Some(MutationStatus::Success) => match kind {
                    ItemKind::Email => result.uploaded_email = true,
                    ItemKind::Attachment => result.uploaded_attachment_count += 1,
                },
                Some(MutationStatus::Error) => result.failed_count += 1,
                Some(MutationStatus::Pending) | None => result.complete = false,
            }
        }

        result.any_failed = result.failed_count > 0;
        result.all_succeeded =
            selected_count > 0 && result.complete && result.failed_count == 0;
        result
    }

    /// Drop every record, ready for a new batch.
    pub fn reset(&self) {
        self.records.clear();
    }
}
