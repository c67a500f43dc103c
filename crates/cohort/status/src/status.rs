//! Derived status types.

use chrono::{DateTime, Utc};
use cohort_types::{MilestoneId, SubmissionRecord};
use serde::Serialize;
use std::fmt;

/// Lifecycle state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneStatus {
    /// Not yet submitted, and not past due (or undated).
    Upcoming,

    /// At least one submission exists.
    Completed,

    /// No submission and the due date has passed.
    Late,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MilestoneStatus::Upcoming => write!(f, "upcoming"),
            MilestoneStatus::Completed => write!(f, "completed"),
            MilestoneStatus::Late => write!(f, "late"),
        }
    }
}

/// The computed state of one milestone.
///
/// Never persisted and never patched: every change of input produces a new
/// value through [`StatusDeriver`](crate::StatusDeriver). Fields are private
/// so no caller can assemble an inconsistent value (for example `Completed`
/// without a submission).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMilestoneStatus {
    milestone_id: MilestoneId,
    status: MilestoneStatus,
    has_submission: bool,
    latest_submission: Option<SubmissionRecord>,
    attachment_count: usize,
    computed_at: DateTime<Utc>,
}

impl DerivedMilestoneStatus {
    /// Assemble from a chosen latest submission. `status` follows from the
    /// inputs; only the deriver calls this.
    pub(crate) fn assemble(
        milestone_id: MilestoneId,
        latest_submission: Option<SubmissionRecord>,
        past_due: bool,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let has_submission = latest_submission.is_some();
        let status = match (has_submission, past_due) {
            (true, _) => MilestoneStatus::Completed,
            (false, true) => MilestoneStatus::Late,
            (false, false) => MilestoneStatus::Upcoming,
        };
        let attachment_count = latest_submission
            .as_ref()
            .map(|s| s.attachments.len())
            .unwrap_or(0);

        Self {
            milestone_id,
            status,
            has_submission,
            latest_submission,
            attachment_count,
            computed_at,
        }
    }

    pub fn milestone_id(&self) -> &MilestoneId {
        &self.milestone_id
    }

    pub fn status(&self) -> MilestoneStatus {
        self.status
    }

    pub fn has_submission(&self) -> bool {
        self.has_submission
    }

    pub fn latest_submission(&self) -> Option<&SubmissionRecord> {
        self.latest_submission.as_ref()
    }

    /// Number of attachments on the latest submission.
    pub fn attachment_count(&self) -> usize {
        self.attachment_count
    }

    /// The `now` this status was computed against.
    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn is_completed(&self) -> bool {
        self.status == MilestoneStatus::Completed
    }

    pub fn is_late(&self) -> bool {
        self.status == MilestoneStatus::Late
    }
}
