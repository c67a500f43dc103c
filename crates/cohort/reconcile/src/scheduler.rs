//! Debounced re-verification cascades.
//!
//! After a state-changing action the backend may not reflect the change yet,
//! so a single re-check is unreliable. A cascade re-runs an action at a
//! series of offsets from the trigger (immediate, short, medium, long).
//!
//! Cascades are keyed by subject. Triggering a key that already has a
//! cascade pending cancels the old one first: debounce on supersede, never
//! accumulation. Every cascade runs under a child of the scheduler's
//! liveness token, so once the owner is torn down no entry fires.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cohort_types::MilestoneId;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Subject of a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReconcileKey {
    /// Re-verify one milestone after a submission.
    Milestone(MilestoneId),

    /// Re-verify every tracked milestone after a view-mode switch.
    ViewMode,
}

impl std::fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileKey::Milestone(id) => write!(f, "{}", id),
            ReconcileKey::ViewMode => write!(f, "view-mode"),
        }
    }
}

/// Presentation mode of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Timeline,
    Summary,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Table => write!(f, "table"),
            ViewMode::Timeline => write!(f, "timeline"),
            ViewMode::Summary => write!(f, "summary"),
        }
    }
}

/// Action run by [`ReconciliationScheduler::trigger`].
///
/// Receives the cascade's token and must re-check it before mutating state.
pub type ReconcileAction<K> =
    Arc<dyn Fn(K, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

struct Cascade {
    generation: u64,
    token: CancellationToken,
}

struct SchedulerInner<K> {
    cascades: DashMap<K, Cascade>,
    generation: AtomicU64,
}

/// Keyed, cancellable cascade scheduler.
///
/// Dropping the scheduler shuts it down.
pub struct ReconciliationScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    root: CancellationToken,
    delays: Vec<Duration>,
    action: ReconcileAction<K>,
    inner: Arc<SchedulerInner<K>>,
}

impl<K> ReconciliationScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Create a scheduler bound to its owner's liveness token.
    ///
    /// `delays` is the cascade used by [`trigger`](Self::trigger).
    pub fn new(liveness: &CancellationToken, delays: Vec<Duration>, action: ReconcileAction<K>) -> Self {
        Self {
            root: liveness.child_token(),
            delays,
            action,
            inner: Arc::new(SchedulerInner {
                cascades: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Schedule the configured cascade for `key`, superseding any pending one.
    ///
    /// Returns `false` when the scheduler is shut down.
    pub fn trigger(&self, key: K) -> bool {
        let action = Arc::clone(&self.action);
        let subject = key.clone();
        self.debounce(key, &self.delays, move |token| action(subject.clone(), token))
    }

    /// Run `f` at each offset in `delays`, superseding any pending cascade
    /// for `key`.
    ///
    /// Offsets are measured from this call, not from the previous entry.
    /// Returns `false` when the scheduler is shut down.
    pub fn debounce<F, Fut>(&self, key: K, delays: &[Duration], f: F) -> bool
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.root.is_cancelled() {
            debug!(key = ?key, "Scheduler shut down; cascade not scheduled");
            return false;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.root.child_token();
        let previous = self.inner.cascades.insert(
            key.clone(),
            Cascade {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            debug!(key = ?key, superseded = previous.generation, "Superseded pending cascade");
        }

        info!(key = ?key, generation, entries = delays.len(), "Scheduling reconciliation cascade");

        let inner = Arc::clone(&self.inner);
        let delays = delays.to_vec();
        let started = Instant::now();
        tokio::spawn(async move {
            for (step, delay) in delays.iter().enumerate() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep_until(started + *delay) => {}
                }
                if token.is_cancelled() {
                    break;
                }
                trace!(key = ?key, generation, step, "Running cascade entry");
                f(token.clone()).await;
            }

            if token.is_cancelled() {
                trace!(key = ?key, generation, "Cascade cancelled");
            }
            inner
                .cascades
                .remove_if(&key, |_, cascade| cascade.generation == generation);
        });

        true
    }

    /// Cancel the pending cascade for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        match self.inner.cascades.remove(key) {
            Some((_, cascade)) => {
                cascade.token.cancel();
                debug!(key = ?key, "Cancelled cascade");
                true
            }
            None => false,
        }
    }

    /// Keys with a cascade still running.
    pub fn pending(&self) -> Vec<K> {
        self.inner
            .cascades
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.inner.cascades.contains_key(key)
    }

    /// Cancel every cascade and refuse new ones.
    pub fn shutdown(&self) {
        if self.root.is_cancelled() && self.inner.cascades.is_empty() {
            return;
        }
        self.root.cancel();
        self.inner.cascades.clear();
        debug!("Reconciliation scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Offsets used by [`trigger`](Self::trigger).
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl<K> Drop for ReconciliationScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use parking_lot::Mutex;

    type Fired = Arc<Mutex<Vec<(String, Duration)>>>;

    fn recording_scheduler(
        liveness: &CancellationToken,
        delays: Vec<Duration>,
    ) -> (ReconciliationScheduler<String>, Fired) {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();
        let sink = Arc::clone(&fired);
        let action: ReconcileAction<String> = Arc::new(move |key, _token| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push((key, origin.elapsed()));
            }
            .boxed()
        });
        (ReconciliationScheduler::new(liveness, delays, action), fired)
    }

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_fires_at_each_offset() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[0, 100, 500, 1500]));

        assert!(scheduler.trigger("m1".to_string()));
        assert!(scheduler.is_pending(&"m1".to_string()));

        tokio::time::sleep(Duration::from_secs(2)).await;

        let offsets: Vec<Duration> = fired.lock().iter().map(|(_, at)| *at).collect();
        assert_eq!(offsets, ms(&[0, 100, 500, 1500]));
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_trigger_supersedes_pending_cascade() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[0, 100, 500, 1500]));

        scheduler.trigger("m1".to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.lock().len(), 2);

        scheduler.trigger("m1".to_string());
        tokio::time::sleep(Duration::from_secs(3)).await;

        let offsets: Vec<Duration> = fired.lock().iter().map(|(_, at)| *at).collect();
        assert_eq!(offsets, ms(&[0, 100, 200, 300, 700, 1700]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[0, 100]));

        scheduler.trigger("m1".to_string());
        scheduler.trigger("m2".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let fired = fired.lock();
        assert_eq!(fired.iter().filter(|(k, _)| k == "m1").count(), 2);
        assert_eq!(fired.iter().filter(|(k, _)| k == "m2").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_cancellation_makes_entries_noops() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[0, 100, 500, 1500]));

        scheduler.trigger("m1".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.lock().len(), 1);

        liveness.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.lock().len(), 1);
        assert!(scheduler.is_shut_down());
        assert!(!scheduler.trigger("m1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_single_key() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[100, 200]));

        scheduler.trigger("m1".to_string());
        scheduler.trigger("m2".to_string());
        assert!(scheduler.cancel(&"m1".to_string()));
        assert!(!scheduler.cancel(&"m1".to_string()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fired.lock().iter().all(|(k, _)| k == "m2"));
        assert_eq!(fired.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_shuts_down_and_leaves_owner_token_alone() {
        let liveness = CancellationToken::new();
        let (scheduler, fired) = recording_scheduler(&liveness, ms(&[100]));

        scheduler.trigger("m1".to_string());
        drop(scheduler);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(fired.lock().is_empty());
        assert!(!liveness.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_with_custom_delays_passes_token() {
        let liveness = CancellationToken::new();
        let (scheduler, _) = recording_scheduler(&liveness, Vec::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        scheduler.debounce("custom".to_string(), &ms(&[10, 20]), move |token| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(token.is_cancelled());
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*seen.lock(), vec![false, false]);
    }
}
