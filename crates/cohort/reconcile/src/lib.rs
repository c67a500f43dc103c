//! # Cohort Reconcile - Multi-View Status Consistency
//!
//! Keeps every mounted milestone view consistent without a central store:
//!
//! - [`ReconciliationScheduler`]: keyed, superseding cascades of delayed
//!   re-verification, bound to a view's liveness token
//! - [`LoadState`] / [`MilestoneEntry`]: per-milestone load state machine
//!   with stale-result protection
//! - [`MilestoneBoard`]: the view-side core. Loads through the
//!   `SubmissionChecker`, follows the `ChangeBus` and runs the submission
//!   protocol
//!
//! Convergence rests on the record store. Events and local writes make the
//! views agree quickly; cascades make them agree with the backend.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cohort_reconcile::{BoardDeps, EngineConfig, MilestoneBoard, Profile};
//! use cohort_submissions::{ClientConfig, RecordStoreClient};
//! use cohort_types::{Milestone, NewSubmission, TeamId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RecordStoreClient::new(&ClientConfig::new("https://cohort.example/api"))?;
//! let deps = BoardDeps::new(Arc::new(client), &EngineConfig::for_profile(Profile::Interactive));
//!
//! let milestones = vec![Milestone::new("m1", "Prototype")];
//! let table = MilestoneBoard::mount("table", TeamId::new("t1"), milestones.clone(), &deps);
//! let card = MilestoneBoard::mount("summary", TeamId::new("t1"), milestones, &deps);
//! table.load_all(false).await?;
//!
//! table
//!     .submit(NewSubmission::new("t1", "m1").with_link("https://demo.example"))
//!     .await?;
//! assert_eq!(card.summary().completed, 1);
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod state;

pub use board::{BoardDeps, BoardRow, BoardSummary, MilestoneBoard, NextDue};
pub use config::{EngineConfig, Profile, ReconcileConfig};
pub use error::{ReconcileError, ReconcileResult};
pub use scheduler::{ReconcileAction, ReconcileKey, ReconciliationScheduler, ViewMode};
pub use state::{LoadState, LoadTicket, MilestoneEntry, MilestoneView, Transition, ViewSource};
