//! # Cohort Types - Core Types for Milestone Status Reconciliation
//!
//! Shared vocabulary for the cohort dashboard engine:
//!
//! - **Identifiers**: [`MilestoneId`], [`TeamId`], [`SubmissionId`], [`ProgramId`]
//! - **Records**: [`Milestone`], [`SubmissionRecord`], [`Attachment`], [`NewSubmission`]
//! - **Notifications**: [`ChangeEvent`]
//! - **Normalization**: [`normalize`] adapts the record store's heterogeneous
//!   shapes into the canonical records above
//!
//! Records are owned by the remote store. Nothing in this crate persists
//! anything; derived status lives in `cohort-status`.

pub mod error;
pub mod event;
pub mod ids;
pub mod milestone;
pub mod normalize;
pub mod submission;
pub mod time;

pub use error::{TypesError, TypesResult};
pub use event::ChangeEvent;
pub use ids::{MilestoneId, ProgramId, SubmissionId, TeamId};
pub use milestone::{sort_milestones, Milestone};
pub use normalize::{
    normalize_milestone, normalize_milestones, normalize_submission, normalize_submissions,
    SubmissionDefaults,
};
pub use submission::{Attachment, NewSubmission, SubmissionRecord};
