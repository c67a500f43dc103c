//! # Cohort Status - Milestone Status Derivation
//!
//! Computes the lifecycle state of a milestone from its due date, the current
//! time and its submissions. The computation is pure: no clock reads, no
//! I/O, no caching. Identical inputs always produce identical output.
//!
//! ## Rules (in priority order)
//!
//! 1. Any submission makes the milestone **completed**, however late it was made.
//! 2. No submission and a due date strictly before `now` makes it **late**.
//! 3. Everything else is **upcoming** (undated, or due in the future).
//!
//! The latest submission is the one with the greatest
//! `submission_timestamp ?? created_time`; ties go to the earliest position
//! in the input list.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use cohort_status::{MilestoneStatus, StatusDeriver};
//! use cohort_types::Milestone;
//!
//! let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
//! let due = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let milestone = Milestone::new("m1", "Prototype").with_due_date(due);
//!
//! let derived = StatusDeriver::compute(&milestone, &[], now);
//! assert_eq!(derived.status(), MilestoneStatus::Late);
//! ```

mod deriver;
mod status;

pub use deriver::{latest_submission_index, StatusDeriver};
pub use status::{DerivedMilestoneStatus, MilestoneStatus};
