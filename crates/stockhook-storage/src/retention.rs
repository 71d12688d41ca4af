//! Retention policy
//!
//! Bounds the data directory to the `max_records` newest deliveries. Eviction runs on
//! the ingestion path and therefore never fails: every problem is reported in the
//! [`RetentionReport`] and logged instead of being returned as an error.
//!
//! The directory listing is a point-in-time snapshot. Concurrent ingestions can make a
//! pass keep one record too many or evict a record written moments earlier; the cap
//! is advisory.

use crate::traits::{FileRemoval, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_records: i64,
}

/// What happened to one stale record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionOutcome {
    Evicted,
    /// Both files were already gone, usually removed by a concurrent pass.
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub evictions: Vec<(String, EvictionOutcome)>,
    /// Set when the directory could not be listed and nothing was attempted.
    pub listing_error: Option<String>,
}

impl RetentionReport {
    pub fn evicted(&self) -> usize {
        self.evictions
            .iter()
            .filter(|(_, outcome)| *outcome == EvictionOutcome::Evicted)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.evictions
            .iter()
            .filter(|(_, outcome)| matches!(outcome, EvictionOutcome::Failed(_)))
            .count()
    }
}

impl RetentionPolicy {
    pub fn new(max_records: i64) -> Self {
        Self { max_records }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_records > 0
    }

    /// Delete every record beyond the newest `max_records`.
    pub async fn enforce(&self, store: &dyn RecordStore) -> RetentionReport {
        let mut report = RetentionReport::default();
        if !self.is_enabled() {
            return report;
        }

        let ids = match store.list(None).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Retention skipped: cannot list records");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        let keep = self.max_records as usize;
        for id in ids.into_iter().skip(keep) {
            let outcome = match store.delete(&id).await {
                Ok(deleted) => match (&deleted.record, &deleted.blob) {
                    (FileRemoval::Failed(reason), _) | (_, FileRemoval::Failed(reason)) => {
                        EvictionOutcome::Failed(reason.clone())
                    }
                    (FileRemoval::Missing, FileRemoval::Missing) => EvictionOutcome::AlreadyGone,
                    _ => EvictionOutcome::Evicted,
                },
                Err(e) => EvictionOutcome::Failed(e.to_string()),
            };

            match &outcome {
                EvictionOutcome::Evicted => tracing::info!(id = %id, "Evicted stale delivery"),
                EvictionOutcome::AlreadyGone => {
                    tracing::debug!(id = %id, "Stale delivery already removed")
                }
                EvictionOutcome::Failed(reason) => {
                    tracing::warn!(id = %id, error = %reason, "Failed to evict stale delivery")
                }
            }
            report.evictions.push((id, outcome));
        }

        report
    }
}
