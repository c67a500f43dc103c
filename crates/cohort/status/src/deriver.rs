//! Status derivation.

use chrono::{DateTime, Utc};
use cohort_types::{Milestone, MilestoneId, SubmissionRecord};

use crate::status::DerivedMilestoneStatus;

/// Pure status computation.
///
/// Stateless; exists as a type so view code can name the operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusDeriver;

impl StatusDeriver {
    /// Compute the derived status of `milestone` at `now`.
    pub fn compute(
        milestone: &Milestone,
        submissions: &[SubmissionRecord],
        now: DateTime<Utc>,
    ) -> DerivedMilestoneStatus {
        Self::derive(milestone.id.clone(), milestone.due_date, now, submissions)
    }

    /// Compute from raw inputs.
    pub fn derive(
        milestone_id: MilestoneId,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        submissions: &[SubmissionRecord],
    ) -> DerivedMilestoneStatus {
        let latest = latest_submission_index(submissions).map(|i| submissions[i].clone());
        let past_due = due_date.map(|due| due < now).unwrap_or(false);

        DerivedMilestoneStatus::assemble(milestone_id, latest, past_due, now)
    }
}

/// Index of the latest submission.
///
/// Greatest resolved time wins; on equal times the earlier index is kept, so
/// the choice does not depend on any sort algorithm.
pub fn latest_submission_index(submissions: &[SubmissionRecord]) -> Option<usize> {
    let mut best: Option<(usize, DateTime<Utc>)> = None;

    for (index, record) in submissions.iter().enumerate() {
        let at = record.resolved_time();
        match best {
            Some((_, best_at)) if at <= best_at => {}
            _ => best = Some((index, at)),
        }
    }

    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MilestoneStatus;
    use chrono::{Duration, TimeZone};
    use cohort_types::{time::parse_datetime, Attachment};

    fn at(raw: &str) -> DateTime<Utc> {
        parse_datetime(raw).unwrap()
    }

    fn record(id: &str, created: &str) -> SubmissionRecord {
        SubmissionRecord::new(id, "m1", "t1", at(created))
    }

    #[test]
    fn test_late_without_submission() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let m = Milestone::new("m1", "Prototype").with_due_date(now - Duration::days(1));

        let derived = StatusDeriver::compute(&m, &[], now);
        assert_eq!(derived.status(), MilestoneStatus::Late);
        assert!(!derived.has_submission());
        assert!(derived.latest_submission().is_none());
        assert_eq!(derived.attachment_count(), 0);
    }

    #[test]
    fn test_upcoming_default() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let undated = Milestone::new("m1", "Retro");
        assert_eq!(
            StatusDeriver::compute(&undated, &[], now).status(),
            MilestoneStatus::Upcoming
        );

        let future = Milestone::new("m2", "Demo").with_due_date(now + Duration::days(3));
        assert_eq!(
            StatusDeriver::compute(&future, &[], now).status(),
            MilestoneStatus::Upcoming
        );
    }

    #[test]
    fn test_due_exactly_now_is_not_late() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let m = Milestone::new("m1", "Demo").with_due_date(now);
        assert_eq!(StatusDeriver::compute(&m, &[], now).status(), MilestoneStatus::Upcoming);
    }

    #[test]
    fn test_submission_dominates_past_due() {
        let now = at("2024-02-01");
        let m = Milestone::new("m1", "Prototype").with_due_date(at("2024-01-01"));
        let subs = vec![record("s1", "2024-02-02")];

        let derived = StatusDeriver::compute(&m, &subs, now);
        assert_eq!(derived.status(), MilestoneStatus::Completed);
        assert!(derived.has_submission());
        assert_eq!(derived.latest_submission().unwrap().id.as_str(), "s1");
    }

    #[test]
    fn test_latest_by_created_time() {
        let subs = vec![
            record("ten", "2024-03-01T10:00:00Z"),
            record("nine", "2024-03-01T09:00:00Z"),
        ];
        let derived = StatusDeriver::derive(MilestoneId::new("m1"), None, at("2024-04-01"), &subs);
        assert_eq!(derived.latest_submission().unwrap().id.as_str(), "ten");
    }

    #[test]
    fn test_submission_timestamp_overrides_created_time() {
        let subs = vec![
            record("a", "2024-03-01T10:00:00Z"),
            record("b", "2024-03-01T09:00:00Z").with_submission_timestamp(at("2024-03-01T11:00:00Z")),
        ];
        assert_eq!(latest_submission_index(&subs), Some(1));
    }

    #[test]
    fn test_tie_goes_to_earliest_position() {
        let subs = vec![
            record("first", "2024-03-01T10:00:00Z"),
            record("second", "2024-03-01T10:00:00Z"),
            record("older", "2024-03-01T08:00:00Z"),
        ];
        for _ in 0..10 {
            assert_eq!(latest_submission_index(&subs), Some(0));
        }
        assert_eq!(latest_submission_index(&[]), None);
    }

    #[test]
    fn test_attachment_count_follows_latest() {
        let file = Attachment {
            url: "https://files.example/a.pdf".into(),
            filename: "a.pdf".into(),
            content_type: "application/pdf".into(),
        };
        let subs = vec![
            record("old", "2024-03-01T08:00:00Z")
                .with_attachment(file.clone())
                .with_attachment(file.clone()),
            record("new", "2024-03-02T08:00:00Z").with_attachment(file),
        ];
        let derived = StatusDeriver::derive(MilestoneId::new("m1"), None, at("2024-04-01"), &subs);
        assert_eq!(derived.attachment_count(), 1);
    }

    #[test]
    fn test_computed_at_is_the_given_now() {
        let now = at("2024-04-01T00:00:00Z");
        let derived = StatusDeriver::derive(MilestoneId::new("m1"), None, now, &[]);
        assert_eq!(derived.computed_at(), now);
    }

    #[test]
    fn test_serialized_shape() {
        let derived = StatusDeriver::derive(MilestoneId::new("m1"), None, at("2024-04-01"), &[]);
        let json = serde_json::to_value(&derived).unwrap();
        assert_eq!(json["status"], "upcoming");
        assert_eq!(json["hasSubmission"], false);
        assert_eq!(json["milestoneId"], "m1");
    }
}
