//! Adapter from upstream record shapes to canonical types.
//!
//! The record store has accumulated several spellings for the same field
//! (`milestoneId`, `milestone_id`, a populated `milestone` object, ...).
//! Everything is resolved here, once, at the data-access boundary; the rest
//! of the engine only ever sees [`SubmissionRecord`] and [`Milestone`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{TypesError, TypesResult};
use crate::ids::{MilestoneId, SubmissionId, TeamId};
use crate::milestone::Milestone;
use crate::submission::{Attachment, SubmissionRecord};
use crate::time::{parse_date_value, parse_epoch_millis};

const ID_KEYS: &[&str] = &["id", "_id"];
const MILESTONE_KEYS: &[&str] = &["milestoneId", "milestone_id", "milestone"];
const TEAM_KEYS: &[&str] = &["teamId", "team_id", "team"];
const CREATED_KEYS: &[&str] = &["createdTime", "created_time", "createdAt", "created_at"];
const SUBMITTED_KEYS: &[&str] = &["submissionTimestamp", "submission_timestamp", "timestamp"];
const LINK_KEYS: &[&str] = &["link", "url"];
const ATTACHMENT_KEYS: &[&str] = &["attachments", "fileUrls", "file_urls"];
const COMMENT_KEYS: &[&str] = &["comments", "comment"];

const NAME_KEYS: &[&str] = &["name", "title"];
const DUE_KEYS: &[&str] = &["dueDate", "due_date", "deadline"];
const SEQUENCE_KEYS: &[&str] = &["sequence", "order", "number"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const STATUS_KEYS: &[&str] = &["status"];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Values used when a submission record omits its owning milestone or team.
///
/// A fetch for a given milestone and team already knows both, so records
/// from that response inherit them.
#[derive(Debug, Clone, Default)]
pub struct SubmissionDefaults {
    pub milestone_id: Option<MilestoneId>,
    pub team_id: Option<TeamId>,
}

impl SubmissionDefaults {
    pub fn new(milestone_id: MilestoneId, team_id: Option<TeamId>) -> Self {
        Self {
            milestone_id: Some(milestone_id),
            team_id,
        }
    }
}

/// Normalize a single upstream submission record.
///
/// Unreadable timestamps are replaced with `now` and flagged through
/// [`SubmissionRecord::invalid_date`]; only a missing identity fails.
pub fn normalize_submission(
    raw: &Value,
    defaults: &SubmissionDefaults,
    now: DateTime<Utc>,
) -> TypesResult<SubmissionRecord> {
    let obj = as_object(raw, "submission")?;

    let id = first_of(obj, ID_KEYS)
        .and_then(id_string)
        .map(SubmissionId::new)
        .ok_or(TypesError::MissingField {
            record: "submission",
            field: "id",
        })?;

    let milestone_id = first_of(obj, MILESTONE_KEYS)
        .and_then(id_string)
        .map(MilestoneId::new)
        .or_else(|| defaults.milestone_id.clone())
        .ok_or(TypesError::MissingField {
            record: "submission",
            field: "milestoneId",
        })?;

    let team_id = first_of(obj, TEAM_KEYS)
        .and_then(id_string)
        .map(TeamId::new)
        .or_else(|| defaults.team_id.clone())
        .ok_or(TypesError::MissingField {
            record: "submission",
            field: "teamId",
        })?;

    let mut invalid_date = false;

    let created_time = match first_of(obj, CREATED_KEYS).map(parse_date_value) {
        Some(Some(ts)) => ts,
        _ => {
            invalid_date = true;
            now
        }
    };

    let submission_timestamp = match first_of(obj, SUBMITTED_KEYS) {
        None => None,
        Some(raw_ts) => match parse_epoch_millis(raw_ts).or_else(|| parse_date_value(raw_ts)) {
            Some(ts) => Some(ts),
            None => {
                invalid_date = true;
                Some(now)
            }
        },
    };

    if invalid_date {
        warn!(
            submission_id = %id,
            milestone_id = %milestone_id,
            "Submission has an unreadable timestamp; substituting normalization time"
        );
    }

    let link = first_of(obj, LINK_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let attachments = first_of(obj, ATTACHMENT_KEYS)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_attachment).collect())
        .unwrap_or_default();

    let comments = first_of(obj, COMMENT_KEYS)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(SubmissionRecord {
        id,
        milestone_id,
        team_id,
        created_time,
        submission_timestamp,
        link,
        attachments,
        comments,
        invalid_date,
    })
}

/// Normalize a batch of upstream submissions.
///
/// Records without a usable identity are dropped with a warning; every
/// other record is kept, in upstream order.
pub fn normalize_submissions(
    raw: &[Value],
    defaults: &SubmissionDefaults,
    now: DateTime<Utc>,
) -> Vec<SubmissionRecord> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, item)| match normalize_submission(item, defaults, now) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "Dropping unusable submission record");
                None
            }
        })
        .collect()
}

/// Normalize a single upstream milestone.
pub fn normalize_milestone(raw: &Value) -> TypesResult<Milestone> {
    let obj = as_object(raw, "milestone")?;

    let id = first_of(obj, ID_KEYS)
        .and_then(id_string)
        .map(MilestoneId::new)
        .ok_or(TypesError::MissingField {
            record: "milestone",
            field: "id",
        })?;

    let name = first_of(obj, NAME_KEYS)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let (due_date, invalid_due_date) = match first_of(obj, DUE_KEYS) {
        None => (None, false),
        Some(raw_due) => match parse_date_value(raw_due) {
            Some(due) => (Some(due), false),
            None => {
                warn!(milestone_id = %id, "Milestone due date is unreadable; treating as undated");
                (None, true)
            }
        },
    };

    let sequence = first_of(obj, SEQUENCE_KEYS)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    let description = first_of(obj, DESCRIPTION_KEYS)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let status_hint = first_of(obj, STATUS_KEYS)
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Milestone {
        id,
        name,
        due_date,
        sequence,
        description,
        status_hint,
        invalid_due_date,
    })
}

/// Normalize a batch of upstream milestones, dropping unusable entries.
pub fn normalize_milestones(raw: &[Value]) -> Vec<Milestone> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, item)| match normalize_milestone(item) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(index, error = %e, "Dropping unusable milestone record");
                None
            }
        })
        .collect()
}

/// Normalize an attachment given as a bare URL or an object.
pub fn normalize_attachment(raw: &Value) -> Option<Attachment> {
    let (url, filename, content_type) = match raw {
        Value::String(url) => (url.trim().to_string(), None, None),
        Value::Object(obj) => {
            let url = first_of(obj, &["url", "fileUrl", "href"])
                .and_then(Value::as_str)?
                .trim()
                .to_string();
            let filename = first_of(obj, &["filename", "fileName", "name"])
                .and_then(Value::as_str)
                .map(str::to_string);
            let content_type = first_of(obj, &["contentType", "content_type", "mimeType", "type"])
                .and_then(Value::as_str)
                .map(str::to_string);
            (url, filename, content_type)
        }
        _ => return None,
    };

    if url.is_empty() {
        debug!("Skipping attachment with empty url");
        return None;
    }

    let filename = filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| filename_from_url(&url));
    let content_type = content_type
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| content_type_for(&filename).to_string());

    Some(Attachment {
        url,
        filename,
        content_type,
    })
}

/// Last path segment of a URL, without query or fragment.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

/// Content type guessed from a file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

fn as_object<'a>(raw: &'a Value, record: &'static str) -> TypesResult<&'a Map<String, Value>> {
    raw.as_object().ok_or_else(|| TypesError::Malformed {
        record,
        reason: format!("expected object, found {}", json_kind(raw)),
    })
}

/// First non-null value among `keys`, in priority order.
fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Identifier from a string, a number, or a populated object carrying `id`/`_id`.
fn id_string(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => first_of(obj, ID_KEYS).and_then(id_string),
        _ => None,
    }
}

fn json_kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_canonical_submission() {
        let raw = json!({
            "id": "s1",
            "milestoneId": "m1",
            "teamId": "t1",
            "createdTime": "2024-03-01T10:00:00Z",
            "link": "https://demo.example",
            "attachments": [
                {"url": "https://files.example/a.pdf", "filename": "a.pdf", "contentType": "application/pdf"}
            ],
            "comments": "v1"
        });

        let record = normalize_submission(&raw, &SubmissionDefaults::default(), now()).unwrap();
        assert_eq!(record.id.as_str(), "s1");
        assert_eq!(record.milestone_id.as_str(), "m1");
        assert_eq!(record.team_id.as_str(), "t1");
        assert_eq!(record.created_time, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        assert_eq!(record.submission_timestamp, None);
        assert_eq!(record.link.as_deref(), Some("https://demo.example"));
        assert_eq!(record.attachments.len(), 1);
        assert_eq!(record.comments, "v1");
        assert!(!record.invalid_date);
    }

    #[test]
    fn test_alias_fields_and_populated_relations() {
        let raw = json!({
            "_id": 42,
            "milestone": {"_id": "m7", "name": "Pitch"},
            "team_id": "t3",
            "created_at": "2024-03-01",
            "timestamp": 1_709_287_200_000_i64,
            "fileUrls": ["https://files.example/uploads/deck.pptx?sig=abc"],
            "comment": "see deck"
        });

        let record = normalize_submission(&raw, &SubmissionDefaults::default(), now()).unwrap();
        assert_eq!(record.id.as_str(), "42");
        assert_eq!(record.milestone_id.as_str(), "m7");
        assert_eq!(record.team_id.as_str(), "t3");
        assert_eq!(
            record.submission_timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(record.attachments[0].filename, "deck.pptx");
        assert_eq!(
            record.attachments[0].content_type,
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
        assert_eq!(record.comments, "see deck");
    }

    #[test]
    fn test_defaults_fill_missing_owner() {
        let raw = json!({"id": "s1", "createdTime": "2024-03-01T10:00:00Z"});
        let defaults = SubmissionDefaults::new(MilestoneId::new("m1"), Some(TeamId::new("t1")));

        let record = normalize_submission(&raw, &defaults, now()).unwrap();
        assert_eq!(record.milestone_id.as_str(), "m1");
        assert_eq!(record.team_id.as_str(), "t1");
    }

    #[test]
    fn test_invalid_timestamps_are_flagged_not_fatal() {
        let raw = json!({
            "id": "s1",
            "milestoneId": "m1",
            "teamId": "t1",
            "createdTime": "not a date",
        });
        let record = normalize_submission(&raw, &SubmissionDefaults::default(), now()).unwrap();
        assert!(record.invalid_date);
        assert_eq!(record.created_time, now());

        let raw = json!({
            "id": "s2",
            "milestoneId": "m1",
            "teamId": "t1",
            "createdTime": "2024-03-01T10:00:00Z",
            "submissionTimestamp": "whenever",
        });
        let record = normalize_submission(&raw, &SubmissionDefaults::default(), now()).unwrap();
        assert!(record.invalid_date);
        assert_eq!(record.resolved_time(), now());
    }

    #[test]
    fn test_missing_identity_is_an_error() {
        let raw = json!({"milestoneId": "m1", "teamId": "t1"});
        let err = normalize_submission(&raw, &SubmissionDefaults::default(), now()).unwrap_err();
        assert_eq!(
            err,
            TypesError::MissingField {
                record: "submission",
                field: "id"
            }
        );

        let err = normalize_submission(&json!("s1"), &SubmissionDefaults::default(), now())
            .unwrap_err();
        assert!(matches!(err, TypesError::Malformed { .. }));
    }

    #[test]
    fn test_batch_keeps_order_and_drops_only_unusable() {
        let raw = vec![
            json!({"id": "a", "milestoneId": "m1", "teamId": "t1", "createdTime": "2024-01-01"}),
            json!({"milestoneId": "m1"}),
            json!({"id": "b", "milestoneId": "m1", "teamId": "t1", "createdTime": "garbage"}),
        ];
        let records = normalize_submissions(&raw, &SubmissionDefaults::default(), now());

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(records[1].invalid_date);
    }

    #[test]
    fn test_milestone_aliases() {
        let raw = json!({
            "_id": "m1",
            "title": "Prototype",
            "deadline": "2024-01-01",
            "order": "3",
            "description": "Working prototype",
            "status": "open"
        });

        let m = normalize_milestone(&raw).unwrap();
        assert_eq!(m.id.as_str(), "m1");
        assert_eq!(m.name, "Prototype");
        assert_eq!(m.due_date, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(m.sequence, 3);
        assert_eq!(m.status_hint.as_deref(), Some("open"));
        assert!(!m.invalid_due_date);
    }

    #[test]
    fn test_milestone_unreadable_due_date_is_undated() {
        let raw = json!({"id": "m1", "name": "Demo", "dueDate": "TBD"});
        let m = normalize_milestone(&raw).unwrap();
        assert!(m.due_date.is_none());
        assert!(m.invalid_due_date);
    }

    #[test]
    fn test_null_alias_falls_through() {
        let raw = json!({"id": "m1", "dueDate": null, "due_date": "2024-02-02"});
        let m = normalize_milestone(&raw).unwrap();
        assert!(m.due_date.is_some());
    }

    #[test]
    fn test_attachment_shapes() {
        assert!(normalize_attachment(&json!("")).is_none());
        assert!(normalize_attachment(&json!(5)).is_none());

        let a = normalize_attachment(&json!({"url": "https://x.example/files/"})).unwrap();
        assert_eq!(a.filename, "files");
        assert_eq!(a.content_type, DEFAULT_CONTENT_TYPE);

        let b = normalize_attachment(&json!("https://x.example/report.PDF#page=2")).unwrap();
        assert_eq!(b.filename, "report.PDF");
        assert_eq!(b.content_type, "application/pdf");
    }
}
