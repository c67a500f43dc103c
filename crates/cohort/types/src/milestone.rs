//! Milestone definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MilestoneId;

/// A deliverable with an optional due date, owned by a program.
///
/// Milestones are owned by the record store and never modified locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: MilestoneId,
    pub name: String,
    pub due_date: Option<DateTime<Utc>>,
    pub sequence: u32,
    #[serde(default)]
    pub description: String,
    /// Raw status string from upstream. Informational only, never used to
    /// derive status.
    #[serde(default)]
    pub status_hint: Option<String>,
    /// The upstream due date was present but unreadable.
    #[serde(default)]
    pub invalid_due_date: bool,
}

impl Milestone {
    pub fn new(id: impl Into<MilestoneId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            due_date: None,
            sequence: 0,
            description: String::new(),
            status_hint: None,
            invalid_due_date: false,
        }
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the due date lies strictly before `now`.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date.map(|due| due < now).unwrap_or(false)
    }
}

/// Order milestones for display: by sequence, then due date (undated last).
pub fn sort_milestones(milestones: &mut [Milestone]) {
    milestones.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
}
