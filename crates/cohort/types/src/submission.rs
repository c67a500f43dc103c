//! Submission records: evidence that a team completed a milestone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MilestoneId, SubmissionId, TeamId};

/// A file attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub content_type: String,
}

/// A single submission for a milestone.
///
/// Records are created once and never mutated. A milestone may collect
/// several records from the same team (resubmissions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub milestone_id: MilestoneId,
    pub team_id: TeamId,
    pub created_time: DateTime<Utc>,
    /// Client-side submission time; preferred over `created_time`.
    #[serde(default)]
    pub submission_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub comments: String,
    /// A timestamp on this record was unreadable and replaced with the
    /// time of normalization.
    #[serde(default)]
    pub invalid_date: bool,
}

impl SubmissionRecord {
    pub fn new(
        id: impl Into<SubmissionId>,
        milestone_id: impl Into<MilestoneId>,
        team_id: impl Into<TeamId>,
        created_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            milestone_id: milestone_id.into(),
            team_id: team_id.into(),
            created_time,
            submission_timestamp: None,
            link: None,
            attachments: Vec::new(),
            comments: String::new(),
            invalid_date: false,
        }
    }

    pub fn with_submission_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.submission_timestamp = Some(ts);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// The time this submission counts as made.
    pub fn resolved_time(&self) -> DateTime<Utc> {
        self.submission_timestamp.unwrap_or(self.created_time)
    }
}

/// Payload for creating a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub team_id: TeamId,
    pub milestone_id: MilestoneId,
    pub file_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub comments: String,
}

impl NewSubmission {
    pub fn new(team_id: impl Into<TeamId>, milestone_id: impl Into<MilestoneId>) -> Self {
        Self {
            team_id: team_id.into(),
            milestone_id: milestone_id.into(),
            file_urls: Vec::new(),
            link: None,
            comments: String::new(),
        }
    }

    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_urls.push(url.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// A submission must carry at least one file or a link.
    pub fn has_evidence(&self) -> bool {
        !self.file_urls.is_empty() || self.link.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}
