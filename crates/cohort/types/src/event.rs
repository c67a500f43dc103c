//! Submission change notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MilestoneId, TeamId};
use crate::submission::SubmissionRecord;

/// A broadcast notification that a milestone's submissions changed.
///
/// Carries the full submission snapshot as known to the publisher, so
/// receivers can recompute status without going back to the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub milestone_id: MilestoneId,
    pub team_id: TeamId,
    pub submissions: Vec<SubmissionRecord>,
    #[serde(default = "Utc::now")]
    pub emitted_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        milestone_id: MilestoneId,
        team_id: TeamId,
        submissions: Vec<SubmissionRecord>,
    ) -> Self {
        Self {
            milestone_id,
            team_id,
            submissions,
            emitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_contract_is_camel_case() {
        let event = ChangeEvent::new(MilestoneId::new("m1"), TeamId::new("t1"), Vec::new());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["milestoneId"], "m1");
        assert_eq!(json["teamId"], "t1");
        assert!(json["submissions"].as_array().unwrap().is_empty());
    }
}
