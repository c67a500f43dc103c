//! Per-milestone submission access with request collapsing and a TTL cache.
//!
//! The checker sits between views and the record store. For each
//! `(milestone, team)` key it guarantees:
//!
//! - at most one outbound fetch in flight; concurrent callers share it
//! - successful results stay fresh for the configured TTL
//! - failures are never cached, so the next request starts clean
//! - expired entries are swept whenever a fetch goes out
//!
//! Fetches run as spawned tasks. A caller that stops waiting (its view was
//! torn down) does not strand the in-flight slot: the task still completes,
//! stores its result and clears the slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cohort_types::{MilestoneId, SubmissionRecord, TeamId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::CheckerConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::source::SubmissionSource;

/// Shared, immutable submission list.
pub type Submissions = Arc<Vec<SubmissionRecord>>;

type SharedFetch = Shared<BoxFuture<'static, SubmissionResult<Submissions>>>;

/// Cache key: the same milestone has a distinct submission set per team.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub milestone_id: MilestoneId,
    pub team_id: Option<TeamId>,
}

impl CacheKey {
    pub fn new(milestone_id: MilestoneId, team_id: Option<TeamId>) -> Self {
        Self {
            milestone_id,
            team_id,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.team_id {
            Some(team) => write!(f, "{}/{}", self.milestone_id, team),
            None => write!(f, "{}", self.milestone_id),
        }
    }
}

/// Options for a single [`SubmissionChecker::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub team_id: Option<TeamId>,

    /// Skip the cache. Still joins a fetch that is already in flight.
    pub force_refresh: bool,
}

impl RequestOptions {
    pub fn for_team(team_id: TeamId) -> Self {
        Self {
            team_id: Some(team_id),
            force_refresh: false,
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Where a [`CheckOutcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Cache,
    Network,
}

/// Result of a submission check.
///
/// Distinguishes a confirmed empty list (`has_submission() == false`,
/// `errored() == false`) from a failed lookup (`errored() == true`).
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    result: SubmissionResult<Submissions>,
    source: OutcomeSource,
}

impl CheckOutcome {
    fn new(result: SubmissionResult<Submissions>, source: OutcomeSource) -> Self {
        Self { result, source }
    }

    /// Submissions found; empty when the check failed.
    pub fn submissions(&self) -> &[SubmissionRecord] {
        match &self.result {
            Ok(subs) => subs.as_slice(),
            Err(_) => &[],
        }
    }

    pub fn has_submission(&self) -> bool {
        !self.submissions().is_empty()
    }

    pub fn errored(&self) -> bool {
        self.result.is_err()
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        self.result.as_ref().err()
    }

    pub fn source(&self) -> OutcomeSource {
        self.source
    }

    pub fn into_result(self) -> SubmissionResult<Submissions> {
        self.result
    }
}

/// A cached fetch result.
#[derive(Debug, Clone)]
struct CacheEntry {
    submissions: Submissions,
    stored_at: Instant,
}

/// A fetch in progress.
struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

/// Checker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckerStats {
    /// Entries currently held, fresh or not.
    pub cached_entries: usize,

    /// Fetches currently in flight.
    pub in_flight: usize,

    /// Outbound fetches started since creation.
    pub fetches_started: u64,
}

struct CheckerInner {
    source: Arc<dyn SubmissionSource>,
    config: CheckerConfig,
    cache: DashMap<CacheKey, CacheEntry>,
    in_flight: DashMap<CacheKey, InFlight>,
    generation: AtomicU64,
}

/// Submission access with in-flight collapsing and bounded-lifetime caching.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct SubmissionChecker {
    inner: Arc<CheckerInner>,
}

impl SubmissionChecker {
    /// Create a new checker over a record-store source.
    pub fn new(source: Arc<dyn SubmissionSource>, config: CheckerConfig) -> Self {
        Self {
            inner: Arc::new(CheckerInner {
                source,
                config,
                cache: DashMap::new(),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.inner.config
    }

    pub fn source(&self) -> Arc<dyn SubmissionSource> {
        Arc::clone(&self.inner.source)
    }

    /// Resolve the submissions for a milestone.
    ///
    /// Never fails outright: errors are carried in the returned outcome.
    #[instrument(skip(self, options), fields(team_id = ?options.team_id, force = options.force_refresh))]
    pub async fn request(&self, milestone_id: &MilestoneId, options: RequestOptions) -> CheckOutcome {
        let key = CacheKey::new(milestone_id.clone(), options.team_id);

        if !options.force_refresh {
            if let Some(submissions) = self.fresh(&key) {
                debug!(key = %key, "Submission cache hit");
                return CheckOutcome::new(Ok(submissions), OutcomeSource::Cache);
            }
        }

        let fetch = self.join_or_start(&key);
        CheckOutcome::new(fetch.await, OutcomeSource::Network)
    }

    /// Fresh cached submissions for a key, without any I/O.
    pub fn cached(&self, key: &CacheKey) -> Option<Submissions> {
        self.fresh(key)
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.contains_key(key)
    }

    /// Store a snapshot received out of band (a change notification).
    ///
    /// The entry is as fresh as a fetch made now.
    pub fn prime(&self, key: CacheKey, submissions: Vec<SubmissionRecord>) {
        debug!(key = %key, count = submissions.len(), "Priming submission cache");
        self.inner.cache.insert(
            key,
            CacheEntry {
                submissions: Arc::new(submissions),
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop the cached entry for a key.
    pub fn invalidate(&self, key: &CacheKey) {
        if self.inner.cache.remove(key).is_some() {
            debug!(key = %key, "Invalidated submission cache entry");
        }
    }

    /// Remove expired entries. Returns how many were removed.
    ///
    /// Runs on every outbound fetch, so keys that are never read again do
    /// not outlive their TTL by more than one fetch.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.inner.config.cache_ttl;
        let before = self.inner.cache.len();
        self.inner
            .cache
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
        let purged = before.saturating_sub(self.inner.cache.len());
        if purged > 0 {
            debug!(purged, "Purged expired submission cache entries");
        }
        purged
    }

    pub fn stats(&self) -> CheckerStats {
        CheckerStats {
            cached_entries: self.inner.cache.len(),
            in_flight: self.inner.in_flight.len(),
            fetches_started: self.inner.generation.load(Ordering::SeqCst),
        }
    }

    fn fresh(&self, key: &CacheKey) -> Option<Submissions> {
        let ttl = self.inner.config.cache_ttl;
        let entry = self.inner.cache.get(key)?;
        if entry.stored_at.elapsed() < ttl {
            return Some(Arc::clone(&entry.submissions));
        }
        drop(entry);
        // Expired: remove lazily, unless someone stored a fresh one meanwhile.
        self.inner
            .cache
            .remove_if(key, |_, entry| entry.stored_at.elapsed() >= ttl);
        None
    }

    /// Attach to the in-flight fetch for `key`, or start one.
    fn join_or_start(&self, key: &CacheKey) -> SharedFetch {
        self.purge_expired();
        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!(key = %key, "Joining in-flight submission fetch");
                occupied.get().fetch.clone()
            }
            Entry::Vacant(vacant) => {
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let fetch = Self::spawn_fetch(Arc::clone(&self.inner), key.clone(), generation);
                vacant.insert(InFlight {
                    generation,
                    fetch: fetch.clone(),
                });
                fetch
            }
        }
    }

    fn spawn_fetch(inner: Arc<CheckerInner>, key: CacheKey, generation: u64) -> SharedFetch {
        info!(key = %key, generation, "Starting submission fetch");

        let handle = tokio::spawn(async move {
            let result = inner
                .source
                .fetch_submissions(&key.milestone_id, key.team_id.as_ref())
                .await
                .map(Arc::new);

            match &result {
                Ok(submissions) => {
                    inner.cache.insert(
                        key.clone(),
                        CacheEntry {
                            submissions: Arc::clone(submissions),
                            stored_at: Instant::now(),
                        },
                    );
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Submission fetch failed; not caching");
                }
            }

            inner
                .in_flight
                .remove_if(&key, |_, slot| slot.generation == generation);
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(SubmissionError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }
}
