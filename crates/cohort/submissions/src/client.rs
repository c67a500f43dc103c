//! HTTP client for the cohort record store

use async_trait::async_trait;
use chrono::Utc;
use cohort_types::{
    normalize_milestones, normalize_submission, normalize_submissions, Milestone, MilestoneId,
    NewSubmission, ProgramId, SubmissionDefaults, SubmissionRecord, TeamId,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::source::SubmissionSource;

/// HTTP client for the record store API
#[derive(Clone)]
pub struct RecordStoreClient {
    client: Client,
    base_url: String,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

impl RecordStoreClient {
    /// Create a new record store client
    pub fn new(config: &ClientConfig) -> SubmissionResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========== Milestone API ==========

    /// List the milestones of a program
    #[instrument(skip_all, fields(program_id = %program_id))]
    pub async fn list_milestones(&self, program_id: &ProgramId) -> SubmissionResult<Vec<Milestone>> {
        let body: Value = self
            .get("/milestones", &[("programId", program_id.as_str())])
            .await?;
        let items = unwrap_list(body, "milestones")?;
        Ok(normalize_milestones(&items))
    }

    // ========== Internal HTTP helpers ==========

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> SubmissionResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> SubmissionResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> SubmissionResult<T> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let error = body
            .error
            .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        let details = body.details.map(|d| match d {
            Value::String(s) => s,
            other => other.to_string(),
        });

        Err(SubmissionError::Api {
            status: status.as_u16(),
            error,
            details,
        })
    }
}

#[async_trait]
impl SubmissionSource for RecordStoreClient {
    #[instrument(skip_all, fields(milestone_id = %milestone_id))]
    async fn fetch_submissions(
        &self,
        milestone_id: &MilestoneId,
        team_id: Option<&TeamId>,
    ) -> SubmissionResult<Vec<SubmissionRecord>> {
        let mut query = vec![("milestoneId", milestone_id.as_str())];
        if let Some(team) = team_id {
            query.push(("teamId", team.as_str()));
        }

        let body: Value = self.get("/submissions", &query).await?;
        let items = unwrap_list(body, "submissions")?;
        let defaults = SubmissionDefaults::new(milestone_id.clone(), team_id.cloned());
        let records = normalize_submissions(&items, &defaults, Utc::now());

        debug!(
            milestone_id = %milestone_id,
            received = items.len(),
            kept = records.len(),
            "Fetched submissions"
        );
        Ok(records)
    }

    #[instrument(skip_all, fields(milestone_id = %draft.milestone_id, team_id = %draft.team_id))]
    async fn create_submission(&self, draft: &NewSubmission) -> SubmissionResult<SubmissionRecord> {
        if !draft.has_evidence() {
            return Err(SubmissionError::Invalid(
                "a submission needs at least one file or a link".to_string(),
            ));
        }

        let body: Value = self.post("/submissions", draft).await?;
        let raw = match body {
            Value::Object(mut obj) if obj.contains_key("submission") => {
                obj.remove("submission").unwrap_or(Value::Null)
            }
            other => other,
        };

        if let Some(error) = raw.get("error").and_then(Value::as_str) {
            warn!(error = %error, "Record store rejected submission with a success status");
            return Err(SubmissionError::Api {
                status: 200,
                error: error.to_string(),
                details: None,
            });
        }

        let defaults =
            SubmissionDefaults::new(draft.milestone_id.clone(), Some(draft.team_id.clone()));
        Ok(normalize_submission(&raw, &defaults, Utc::now())?)
    }
}

/// Accept both `{ "<key>": [...] }` and a bare array.
fn unwrap_list(body: Value, key: &str) -> SubmissionResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(SubmissionError::Decode(format!("`{}` is not an array", key))),
        },
        _ => Err(SubmissionError::Decode(format!(
            "expected an object with `{}`",
            key
        ))),
    }
}
