//! In-memory record store for tests and demos.
//!
//! Mimics the behaviours of the real store that matter to reconciliation:
//! response latency, transient failures and write lag (a created record
//! only shows up in reads after a delay).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cohort_types::{
    normalize::normalize_attachment, MilestoneId, NewSubmission, SubmissionRecord, TeamId,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{SubmissionError, SubmissionResult};
use crate::source::SubmissionSource;

struct StoredRecord {
    record: SubmissionRecord,
    visible_at: Instant,
}

/// In-memory [`SubmissionSource`].
pub struct InMemorySubmissionSource {
    records: Mutex<Vec<StoredRecord>>,
    latency: Duration,
    write_lag: Duration,
    fetches: AtomicUsize,
    creates: AtomicUsize,
    failing_fetches: AtomicUsize,
}

impl Default for InMemorySubmissionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySubmissionSource {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            write_lag: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Hide created records from reads for `lag`.
    pub fn with_write_lag(mut self, lag: Duration) -> Self {
        self.write_lag = lag;
        self
    }

    /// Insert a record, immediately visible.
    pub fn insert(&self, record: SubmissionRecord) {
        self.records.lock().push(StoredRecord {
            record,
            visible_at: Instant::now(),
        });
    }

    /// Make the next `n` fetches fail with a network error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// Number of fetches received.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of creates received.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubmissionSource for InMemorySubmissionSource {
    async fn fetch_submissions(
        &self,
        milestone_id: &MilestoneId,
        team_id: Option<&TeamId>,
    ) -> SubmissionResult<Vec<SubmissionRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.take_failure() {
            return Err(SubmissionError::Network("connection reset".to_string()));
        }

        let now = Instant::now();
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|stored| stored.visible_at <= now)
            .map(|stored| &stored.record)
            .filter(|r| &r.milestone_id == milestone_id)
            .filter(|r| team_id.map_or(true, |t| &r.team_id == t))
            .cloned()
            .collect())
    }

    async fn create_submission(&self, draft: &NewSubmission) -> SubmissionResult<SubmissionRecord> {
        if !draft.has_evidence() {
            return Err(SubmissionError::Invalid(
                "a submission needs at least one file or a link".to_string(),
            ));
        }

        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut record = SubmissionRecord::new(
            format!("sub-{}", n),
            draft.milestone_id.clone(),
            draft.team_id.clone(),
            Utc::now(),
        )
        .with_comments(draft.comments.clone());
        record.link = draft.link.clone();
        record.attachments = draft
            .file_urls
            .iter()
            .filter_map(|url| normalize_attachment(&Value::String(url.clone())))
            .collect();

        self.records.lock().push(StoredRecord {
            record: record.clone(),
            visible_at: Instant::now() + self.write_lag,
        });
        Ok(record)
    }
}
