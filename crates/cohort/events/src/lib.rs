//! # Cohort Events - Change Bus
//!
//! Synchronous, in-process publish/subscribe for submission changes. When a
//! submission is created for a milestone, one [`ChangeEvent`] is published
//! and every interested view updates from its payload without refetching.
//!
//! ```rust
//! use cohort_events::{ChangeBus, SubscriptionFilter};
//! use cohort_types::{ChangeEvent, MilestoneId, TeamId};
//!
//! let bus = ChangeBus::new();
//! let sub = bus.subscribe_filtered(
//!     SubscriptionFilter::Milestone(MilestoneId::new("m1")),
//!     |event| println!("{} changed", event.milestone_id),
//! );
//!
//! let delivered = bus.publish(&ChangeEvent::new(
//!     MilestoneId::new("m1"),
//!     TeamId::new("t1"),
//!     Vec::new(),
//! ));
//! assert_eq!(delivered, 1);
//! sub.unsubscribe();
//! ```
//!
//! [`ChangeEvent`]: cohort_types::ChangeEvent

pub mod bus;

pub use bus::{ChangeBus, Subscription, SubscriptionFilter};
