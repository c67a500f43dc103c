//! Error types for cohort-reconcile crate.

use cohort_submissions::SubmissionError;
use cohort_types::{MilestoneId, TeamId};
use thiserror::Error;

/// Errors raised by boards and the reconciliation machinery.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// A load-state transition that the state machine does not allow.
    #[error("invalid load transition for {milestone_id}: {from} -> {to}")]
    InvalidTransition {
        milestone_id: MilestoneId,
        from: &'static str,
        to: &'static str,
    },

    /// The milestone is not tracked by this board.
    #[error("milestone not tracked: {0}")]
    UnknownMilestone(MilestoneId),

    /// The submission belongs to a team this board does not show.
    #[error("submission for team {submitted} on a board for team {board}")]
    TeamMismatch { board: TeamId, submitted: TeamId },

    /// A newer reconciliation replaced this load before it finished.
    #[error("load superseded: {0}")]
    Superseded(MilestoneId),

    /// The board was torn down; the result was not applied.
    #[error("board torn down: {0}")]
    TornDown(String),

    /// Submission data access failed.
    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
