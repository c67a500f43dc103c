//! The record-store seam.

use async_trait::async_trait;
use cohort_types::{MilestoneId, NewSubmission, SubmissionRecord, TeamId};

use crate::error::SubmissionResult;

/// Access to the remote record store for submissions.
///
/// Implementations return canonical records; upstream shapes never leak
/// past this trait.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Fetch all submissions for a milestone, optionally scoped to a team.
    async fn fetch_submissions(
        &self,
        milestone_id: &MilestoneId,
        team_id: Option<&TeamId>,
    ) -> SubmissionResult<Vec<SubmissionRecord>>;

    /// Create a submission and return the stored record.
    async fn create_submission(&self, draft: &NewSubmission) -> SubmissionResult<SubmissionRecord>;
}
