//! Change bus for submission notifications.
//!
//! Delivery is synchronous and in subscription order. Each publish works on
//! a snapshot of the subscriber list taken when it starts:
//!
//! - a subscriber added during delivery does not see the current event
//! - a subscriber removed during delivery still sees the current event, and
//!   none after it
//!
//! The bus does not route. Every subscriber is offered every event and its
//! own predicate decides whether the handler runs.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use cohort_types::{ChangeEvent, MilestoneId, TeamId};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

type Predicate = Box<dyn Fn(&MilestoneId, &TeamId) -> bool + Send + Sync>;
type Handler = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    predicate: Predicate,
    handler: Handler,
}

struct BusInner {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

/// Publish/subscribe channel for [`ChangeEvent`]s.
///
/// An explicit instance handed to every component that needs it; clones
/// share the same subscriber list.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Register a handler guarded by a predicate over `(milestone, team)`.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe<P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        P: Fn(&MilestoneId, &TeamId) -> bool + Send + Sync + 'static,
        H: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().push(Arc::new(Subscriber {
            id,
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        }));
        debug!(subscription_id = id, "Change bus subscription added");

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        }
    }

    /// Register a handler using a ready-made filter.
    pub fn subscribe_filtered<H>(&self, filter: SubscriptionFilter, handler: H) -> Subscription
    where
        H: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(move |m, t| filter.matches(m, t), handler)
    }

    /// Deliver an event to every current subscriber whose predicate accepts it.
    ///
    /// Returns how many handlers ran. A panicking handler is logged and
    /// skipped; delivery to the rest continues.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<Arc<Subscriber>> = self.inner.subscribers.lock().clone();
        self.inner.published.fetch_add(1, Ordering::SeqCst);

        let mut delivered = 0;
        for subscriber in snapshot {
            if !(subscriber.predicate)(&event.milestone_id, &event.team_id) {
                trace!(subscription_id = subscriber.id, "Change event filtered out");
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    subscription_id = subscriber.id,
                    milestone_id = %event.milestone_id,
                    "Change event handler panicked"
                ),
            }
        }

        debug!(
            milestone_id = %event.milestone_id,
            team_id = %event.team_id,
            submissions = event.submissions.len(),
            delivered,
            "Published change event"
        );
        delivered
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Number of events published since creation.
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::SeqCst)
    }
}

/// Handle to a bus subscription.
///
/// [`unsubscribe`](Self::unsubscribe) is idempotent; dropping the handle
/// unsubscribes as well.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
    active: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop receiving events. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.subscribers.lock().retain(|s| s.id != self.id);
            debug!(subscription_id = self.id, "Change bus subscription removed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ready-made subscriber predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every event.
    Any,

    /// Events for one milestone, any team.
    Milestone(MilestoneId),

    /// Events for one team, any milestone.
    Team(TeamId),

    /// Events for one milestone of one team.
    MilestoneAndTeam(MilestoneId, TeamId),

    /// Events for a set of milestones, optionally for one team.
    Milestones {
        milestones: HashSet<MilestoneId>,
        team: Option<TeamId>,
    },
}

impl SubscriptionFilter {
    pub fn matches(&self, milestone_id: &MilestoneId, team_id: &TeamId) -> bool {
        match self {
            SubscriptionFilter::Any => true,
            SubscriptionFilter::Milestone(m) => m == milestone_id,
            SubscriptionFilter::Team(t) => t == team_id,
            SubscriptionFilter::MilestoneAndTeam(m, t) => m == milestone_id && t == team_id,
            SubscriptionFilter::Milestones { milestones, team } => {
                milestones.contains(milestone_id) && team.as_ref().map_or(true, |t| t == team_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event(milestone: &str, team: &str) -> ChangeEvent {
        ChangeEvent::new(MilestoneId::new(milestone), TeamId::new(team), Vec::new())
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &ChangeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fan_out_to_all_and_not_to_unsubscribed() {
        let bus = ChangeBus::new();
        let (a_count, a) = counter();
        let (b_count, b) = counter();
        let (c_count, c) = counter();

        let _sa = bus.subscribe_filtered(SubscriptionFilter::Any, a);
        let _sb = bus.subscribe_filtered(SubscriptionFilter::Milestone(MilestoneId::new("m1")), b);
        let sc = bus.subscribe_filtered(SubscriptionFilter::Any, c);
        sc.unsubscribe();

        assert_eq!(bus.publish(&event("m1", "t1")), 2);
        assert_eq!(a_count.load(Ordering::SeqCst), 1);
        assert_eq!(b_count.load(Ordering::SeqCst), 1);
        assert_eq!(c_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_predicate_filters_per_subscriber() {
        let bus = ChangeBus::new();
        let (count, handler) = counter();
        let _s = bus.subscribe_filtered(
            SubscriptionFilter::MilestoneAndTeam(MilestoneId::new("m1"), TeamId::new("t1")),
            handler,
        );

        bus.publish(&event("m1", "t2"));
        bus.publish(&event("m2", "t1"));
        bus.publish(&event("m1", "t1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.published_count(), 3);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = ChangeBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<_> = (0..4)
            .map(|i| {
                let order = Arc::clone(&order);
                bus.subscribe(|_, _| true, move |_| order.lock().push(i))
            })
            .collect();

        bus.publish(&event("m1", "t1"));
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        drop(subs);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_drop_safe() {
        let bus = ChangeBus::new();
        let (_, handler) = counter();
        let sub = bus.subscribe(|_, _| true, handler);
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count(), 0);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = ChangeBus::new();
        let (_, handler) = counter();
        let sub = bus.subscribe(|_, _| true, handler);
        drop(bus);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_subscribe_during_delivery_misses_current_event() {
        let bus = ChangeBus::new();
        let (late_count, late_handler) = counter();
        let late_handler = Arc::new(late_handler);
        let added: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let bus_clone = bus.clone();
        let added_clone = Arc::clone(&added);
        let _first = bus.subscribe(
            |_, _| true,
            move |_| {
                let h = Arc::clone(&late_handler);
                let sub = bus_clone.subscribe(|_, _| true, move |e| h(e));
                added_clone.lock().push(sub);
            },
        );

        bus.publish(&event("m1", "t1"));
        assert_eq!(late_count.load(Ordering::SeqCst), 0);

        bus.publish(&event("m1", "t1"));
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_delivery_applies_to_next_event() {
        let bus = ChangeBus::new();
        let (second_count, second_handler) = counter();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_clone = Arc::clone(&slot);
        let _first = bus.subscribe(
            |_, _| true,
            move |_| {
                if let Some(sub) = slot_clone.lock().as_ref() {
                    sub.unsubscribe();
                }
            },
        );
        *slot.lock() = Some(bus.subscribe(|_, _| true, second_handler));

        bus.publish(&event("m1", "t1"));
        assert_eq!(second_count.load(Ordering::SeqCst), 1);

        bus.publish(&event("m1", "t1"));
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = ChangeBus::new();
        let (count, handler) = counter();
        let _bad = bus.subscribe(|_, _| true, |_| panic!("handler bug"));
        let _good = bus.subscribe(|_, _| true, handler);

        assert_eq!(bus.publish(&event("m1", "t1")), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_milestone_set_filter() {
        let filter = SubscriptionFilter::Milestones {
            milestones: [MilestoneId::new("m1"), MilestoneId::new("m2")]
                .into_iter()
                .collect(),
            team: Some(TeamId::new("t1")),
        };
        assert!(filter.matches(&MilestoneId::new("m2"), &TeamId::new("t1")));
        assert!(!filter.matches(&MilestoneId::new("m3"), &TeamId::new("t1")));
        assert!(!filter.matches(&MilestoneId::new("m1"), &TeamId::new("t9")));
    }
}
