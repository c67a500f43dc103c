//! # Cohort Submissions - Submission Data Access
//!
//! The data-access boundary of the reconciliation engine:
//!
//! - [`SubmissionSource`]: the record-store seam
//! - [`RecordStoreClient`]: HTTP implementation (`GET`/`POST /submissions`,
//!   `GET /milestones`)
//! - [`SubmissionChecker`]: per-milestone access with in-flight request
//!   collapsing and a TTL cache
//!
//! Upstream payloads are normalized by `cohort_types::normalize` inside the
//! client; callers only see canonical records.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cohort_submissions::{
//!     CheckerConfig, ClientConfig, RecordStoreClient, RequestOptions, SubmissionChecker,
//! };
//! use cohort_types::{MilestoneId, TeamId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RecordStoreClient::new(&ClientConfig::new("https://cohort.example/api"))?;
//! let checker = SubmissionChecker::new(Arc::new(client), CheckerConfig::default());
//!
//! let outcome = checker
//!     .request(&MilestoneId::new("m1"), RequestOptions::for_team(TeamId::new("t1")))
//!     .await;
//! if outcome.errored() {
//!     println!("lookup failed: {:?}", outcome.error());
//! } else {
//!     println!("{} submissions", outcome.submissions().len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod client;
pub mod config;
pub mod error;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use checker::{
    CacheKey, CheckOutcome, CheckerStats, OutcomeSource, RequestOptions, SubmissionChecker,
    Submissions,
};
pub use client::RecordStoreClient;
pub use config::{CheckerConfig, ClientConfig};
pub use error::{SubmissionError, SubmissionResult};
pub use source::SubmissionSource;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemorySubmissionSource;
