//! View-side core shared by every milestone view.
//!
//! A [`MilestoneBoard`] is what one mounted view (table, summary card,
//! timeline, detail dialog) holds: a team's milestones, each with its own
//! [`LoadState`], kept consistent with the other boards through the
//! [`ChangeBus`] and with the backend through reconciliation cascades.
//!
//! Submitting from a board runs the consistency protocol:
//!
//! 1. create the record through the submission source
//! 2. apply `completed` locally, including the new record
//! 3. prime the checker cache and publish a [`ChangeEvent`]
//! 4. trigger a cascade of force-refresh loads for the milestone
//!
//! Other boards recompute from the event snapshot without a fetch. Boards
//! mounted later read through the checker.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use cohort_events::{ChangeBus, Subscription, SubscriptionFilter};
use cohort_status::{DerivedMilestoneStatus, MilestoneStatus};
use cohort_submissions::{CacheKey, RequestOptions, SubmissionChecker, SubmissionSource};
use cohort_types::{
    sort_milestones, ChangeEvent, Milestone, MilestoneId, NewSubmission, SubmissionRecord, TeamId,
};
use futures::future::{try_join_all, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{EngineConfig, ReconcileConfig};
use crate::error::{ReconcileError, ReconcileResult};
use crate::scheduler::{ReconcileAction, ReconcileKey, ReconciliationScheduler, ViewMode};
use crate::state::{LoadState, LoadTicket, MilestoneEntry, MilestoneView, Transition, ViewSource};

/// Shared collaborators handed to every board.
#[derive(Clone)]
pub struct BoardDeps {
    pub checker: SubmissionChecker,
    pub bus: ChangeBus,
    pub reconcile: ReconcileConfig,
}

impl BoardDeps {
    /// Build a checker and a fresh bus over `source`.
    pub fn new(source: Arc<dyn SubmissionSource>, config: &EngineConfig) -> Self {
        Self {
            checker: SubmissionChecker::new(source, config.checker.clone()),
            bus: ChangeBus::new(),
            reconcile: config.reconcile.clone(),
        }
    }
}

/// One row of a board, in milestone order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRow {
    pub milestone: Milestone,
    pub state: &'static str,
    pub status: Option<DerivedMilestoneStatus>,
    pub error: Option<String>,
}

/// The milestone that is due next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDue {
    pub milestone_id: MilestoneId,
    pub name: String,
    pub due_date: DateTime<Utc>,
}

/// Summary card counts. The buckets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub total: usize,
    pub upcoming: usize,
    pub completed: usize,
    pub late: usize,
    /// Last load failed, whatever was shown before.
    pub errored: usize,
    /// Tracked but never resolved.
    pub pending: usize,
    pub next_due: Option<NextDue>,
}

struct BoardInner {
    name: String,
    team_id: TeamId,
    checker: SubmissionChecker,
    bus: ChangeBus,
    liveness: CancellationToken,
    order: Vec<MilestoneId>,
    entries: Mutex<HashMap<MilestoneId, MilestoneEntry>>,
    view_mode: Mutex<ViewMode>,
    subscription: Mutex<Option<Subscription>>,
    scheduler: ReconciliationScheduler<ReconcileKey>,
}

/// A mounted view's milestones and their reconciled state.
///
/// Dropping the board tears it down.
pub struct MilestoneBoard {
    inner: Arc<BoardInner>,
}

impl MilestoneBoard {
    /// Mount a board for `team_id` over `milestones`.
    ///
    /// Subscribes to change events for this team and these milestones.
    /// Nothing is loaded until [`load`](Self::load) or
    /// [`load_all`](Self::load_all).
    pub fn mount(
        name: impl Into<String>,
        team_id: TeamId,
        mut milestones: Vec<Milestone>,
        deps: &BoardDeps,
    ) -> Self {
        let name = name.into();
        sort_milestones(&mut milestones);

        let order: Vec<MilestoneId> = milestones.iter().map(|m| m.id.clone()).collect();
        let entries: HashMap<MilestoneId, MilestoneEntry> = milestones
            .into_iter()
            .map(|m| (m.id.clone(), MilestoneEntry::new(m)))
            .collect();
        let liveness = CancellationToken::new();

        let inner = Arc::new_cyclic(|weak: &Weak<BoardInner>| BoardInner {
            scheduler: ReconciliationScheduler::new(
                &liveness,
                deps.reconcile.cascade_delays.clone(),
                reconcile_action(weak.clone()),
            ),
            name: name.clone(),
            team_id: team_id.clone(),
            checker: deps.checker.clone(),
            bus: deps.bus.clone(),
            liveness,
            order,
            entries: Mutex::new(entries),
            view_mode: Mutex::new(ViewMode::default()),
            subscription: Mutex::new(None),
        });

        let filter = SubscriptionFilter::Milestones {
            milestones: inner.order.iter().cloned().collect::<HashSet<_>>(),
            team: Some(team_id.clone()),
        };
        let weak = Arc::downgrade(&inner);
        let subscription = deps.bus.subscribe_filtered(filter, move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_change(event);
            }
        });
        *inner.subscription.lock() = Some(subscription);

        info!(
            board = %name,
            team_id = %team_id,
            milestones = inner.order.len(),
            "Mounted milestone board"
        );
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn team_id(&self) -> &TeamId {
        &self.inner.team_id
    }

    /// Tracked milestones in display order.
    pub fn milestones(&self) -> Vec<Milestone> {
        let entries = self.inner.entries.lock();
        self.inner
            .order
            .iter()
            .filter_map(|id| entries.get(id).map(|e| e.milestone().clone()))
            .collect()
    }

    /// Resolve one milestone through the checker.
    ///
    /// A failed fetch is not an `Err`: it lands in [`LoadState::Error`].
    pub async fn load(&self, milestone_id: &MilestoneId, force: bool) -> ReconcileResult<LoadState> {
        let token = self.inner.liveness.clone();
        self.inner.load(milestone_id, force, &token).await
    }

    /// Resolve every tracked milestone concurrently.
    pub async fn load_all(&self, force: bool) -> ReconcileResult<Vec<LoadState>> {
        let token = self.inner.liveness.clone();
        self.inner.load_all(force, &token).await
    }

    /// Current load state of a milestone.
    pub fn state(&self, milestone_id: &MilestoneId) -> Option<LoadState> {
        self.inner
            .entries
            .lock()
            .get(milestone_id)
            .map(|e| e.state().clone())
    }

    /// Most recent derived status, including while a reload is running.
    pub fn status(&self, milestone_id: &MilestoneId) -> Option<DerivedMilestoneStatus> {
        self.inner
            .entries
            .lock()
            .get(milestone_id)
            .and_then(|e| e.last_view().map(|v| v.status.clone()))
    }

    /// Derived statuses of every milestone that has one, in display order.
    pub fn statuses(&self) -> Vec<DerivedMilestoneStatus> {
        let entries = self.inner.entries.lock();
        self.inner
            .order
            .iter()
            .filter_map(|id| entries.get(id))
            .filter_map(|e| e.last_view().map(|v| v.status.clone()))
            .collect()
    }

    /// One row per milestone, in display order.
    pub fn rows(&self) -> Vec<BoardRow> {
        let entries = self.inner.entries.lock();
        self.inner
            .order
            .iter()
            .filter_map(|id| entries.get(id))
            .map(|e| BoardRow {
                milestone: e.milestone().clone(),
                state: e.state().label(),
                status: e.last_view().map(|v| v.status.clone()),
                error: e.state().error().map(|err| err.to_string()),
            })
            .collect()
    }

    /// Create a submission and propagate it to every view.
    #[instrument(skip_all, fields(board = %self.inner.name, milestone_id = %draft.milestone_id))]
    pub async fn submit(&self, draft: NewSubmission) -> ReconcileResult<DerivedMilestoneStatus> {
        self.inner.ensure_live()?;
        if draft.team_id != self.inner.team_id {
            return Err(ReconcileError::TeamMismatch {
                board: self.inner.team_id.clone(),
                submitted: draft.team_id.clone(),
            });
        }
        if !self.inner.order.contains(&draft.milestone_id) {
            return Err(ReconcileError::UnknownMilestone(draft.milestone_id.clone()));
        }

        let record = self.inner.checker.source().create_submission(&draft).await?;
        info!(submission_id = %record.id, "Submission created");

        let key = CacheKey::new(draft.milestone_id.clone(), Some(draft.team_id.clone()));
        let snapshot = self.inner.snapshot_with(&key, record);

        // Read-your-own-write before anyone else hears about it.
        let status = if self.inner.liveness.is_cancelled() {
            None
        } else {
            self.inner
                .apply(&draft.milestone_id, Arc::clone(&snapshot), ViewSource::LocalWrite)
        };

        self.inner.checker.prime(key, snapshot.as_ref().clone());
        self.inner.bus.publish(&ChangeEvent::new(
            draft.milestone_id.clone(),
            draft.team_id.clone(),
            snapshot.as_ref().clone(),
        ));

        if !self
            .inner
            .scheduler
            .trigger(ReconcileKey::Milestone(draft.milestone_id.clone()))
        {
            debug!("Board torn down during submit; no reconciliation");
        }

        status.ok_or_else(|| ReconcileError::TornDown(self.inner.name.clone()))
    }

    /// Switch presentation mode and re-verify every milestone.
    pub fn switch_view_mode(&self, mode: ViewMode) -> bool {
        if self.inner.liveness.is_cancelled() {
            return false;
        }
        let previous = std::mem::replace(&mut *self.inner.view_mode.lock(), mode);
        debug!(board = %self.inner.name, from = %previous, to = %mode, "View mode switched");
        self.inner.scheduler.trigger(ReconcileKey::ViewMode)
    }

    pub fn view_mode(&self) -> ViewMode {
        *self.inner.view_mode.lock()
    }

    /// Keys with a reconciliation cascade still running.
    pub fn pending_reconciliation(&self) -> Vec<ReconcileKey> {
        self.inner.scheduler.pending()
    }

    /// Counts per status and the next milestone due.
    ///
    /// Every milestone lands in exactly one of `upcoming`, `completed`,
    /// `late`, `errored` or `pending`, so the counts add up to `total`.
    pub fn summary(&self) -> BoardSummary {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> BoardSummary {
        let entries = self.inner.entries.lock();
        let mut summary = BoardSummary {
            total: self.inner.order.len(),
            ..BoardSummary::default()
        };

        for entry in self.inner.order.iter().filter_map(|id| entries.get(id)) {
            let status = match (entry.state().error(), entry.last_view()) {
                (Some(_), _) => {
                    summary.errored += 1;
                    continue;
                }
                (None, Some(view)) => view.status.status(),
                (None, None) => {
                    summary.pending += 1;
                    continue;
                }
            };
            match status {
                MilestoneStatus::Upcoming => summary.upcoming += 1,
                MilestoneStatus::Completed => summary.completed += 1,
                MilestoneStatus::Late => summary.late += 1,
            }

            let milestone = entry.milestone();
            if status != MilestoneStatus::Completed && !milestone.is_past_due(now) {
                if let Some(due) = milestone.due_date {
                    let sooner = summary.next_due.as_ref().map_or(true, |n| due < n.due_date);
                    if sooner {
                        summary.next_due = Some(NextDue {
                            milestone_id: milestone.id.clone(),
                            name: milestone.name.clone(),
                            due_date: due,
                        });
                    }
                }
            }
        }

        summary
    }

    /// Stop everything tied to this board. Idempotent.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.liveness.is_cancelled()
    }
}

impl Drop for MilestoneBoard {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

fn reconcile_action(board: Weak<BoardInner>) -> ReconcileAction<ReconcileKey> {
    Arc::new(move |key, token| {
        let board = board.clone();
        async move {
            let Some(inner) = board.upgrade() else {
                return;
            };
            let result = match &key {
                ReconcileKey::Milestone(id) => inner.load(id, true, &token).await.map(|_| ()),
                ReconcileKey::ViewMode => inner.load_all(true, &token).await.map(|_| ()),
            };
            if let Err(e) = result {
                debug!(board = %inner.name, key = %key, error = %e, "Reconciliation entry skipped");
            }
        }
        .boxed()
    })
}

/// A started load. Dropped without a result, it abandons its ticket so the
/// entry does not stay `Loading`.
struct PendingLoad<'a> {
    entries: &'a Mutex<HashMap<MilestoneId, MilestoneEntry>>,
    milestone_id: &'a MilestoneId,
    ticket: LoadTicket,
    armed: bool,
}

impl PendingLoad<'_> {
    fn into_ticket(mut self) -> LoadTicket {
        self.armed = false;
        self.ticket.clone()
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.entries.lock().get_mut(self.milestone_id) {
            if let Err(e) = entry.abandon_load(&self.ticket) {
                warn!(milestone_id = %self.milestone_id, error = %e, "Could not abandon load");
            }
        }
    }
}

impl BoardInner {
    fn ensure_live(&self) -> ReconcileResult<()> {
        if self.liveness.is_cancelled() {
            return Err(ReconcileError::TornDown(self.name.clone()));
        }
        Ok(())
    }

    /// Why a load on `token` stopped: teardown, or a newer cascade.
    fn interrupted(&self, milestone_id: &MilestoneId) -> ReconcileError {
        if self.liveness.is_cancelled() {
            ReconcileError::TornDown(self.name.clone())
        } else {
            ReconcileError::Superseded(milestone_id.clone())
        }
    }

    #[instrument(skip(self, token), fields(board = %self.name, team_id = %self.team_id))]
    async fn load(
        &self,
        milestone_id: &MilestoneId,
        force: bool,
        token: &CancellationToken,
    ) -> ReconcileResult<LoadState> {
        if token.is_cancelled() {
            return Err(self.interrupted(milestone_id));
        }

        let (pending, milestone) = {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(milestone_id)
                .ok_or_else(|| ReconcileError::UnknownMilestone(milestone_id.clone()))?;
            let pending = PendingLoad {
                entries: &self.entries,
                milestone_id,
                ticket: entry.begin_load(),
                armed: true,
            };
            (pending, entry.milestone().clone())
        };

        let mut options = RequestOptions::for_team(self.team_id.clone());
        if force {
            options = options.force_refresh();
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            outcome = self.checker.request(milestone_id, options) => Some(outcome),
        };

        let outcome = match outcome {
            Some(outcome) if !token.is_cancelled() => outcome,
            _ => {
                debug!("Load interrupted; abandoning");
                drop(pending);
                return Err(self.interrupted(milestone_id));
            }
        };
        let ticket = pending.into_ticket();

        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(milestone_id)
            .ok_or_else(|| ReconcileError::UnknownMilestone(milestone_id.clone()))?;

        let transition = match outcome.into_result() {
            Ok(submissions) => {
                let view = MilestoneView::derive(&milestone, submissions, Utc::now(), ViewSource::Fetch);
                entry.finish_load(&ticket, view)?
            }
            Err(e) => {
                warn!(error = %e, "Milestone load failed");
                entry.fail_load(&ticket, e)?
            }
        };
        if transition == Transition::Stale {
            debug!("Load superseded by newer state");
        }

        Ok(entry.state().clone())
    }

    async fn load_all(&self, force: bool, token: &CancellationToken) -> ReconcileResult<Vec<LoadState>> {
        try_join_all(self.order.iter().map(|id| self.load(id, force, token))).await
    }

    /// Known submissions for a key with `record` appended, without duplicates.
    fn snapshot_with(&self, key: &CacheKey, record: SubmissionRecord) -> Arc<Vec<SubmissionRecord>> {
        let known: Vec<SubmissionRecord> = {
            let entries = self.entries.lock();
            match entries.get(&key.milestone_id).and_then(|e| e.last_view()) {
                Some(view) => view.submissions().to_vec(),
                None => self
                    .checker
                    .cached(key)
                    .map(|subs| subs.as_ref().clone())
                    .unwrap_or_default(),
            }
        };

        let mut snapshot: Vec<SubmissionRecord> =
            known.into_iter().filter(|r| r.id != record.id).collect();
        snapshot.push(record);
        Arc::new(snapshot)
    }

    /// Apply a snapshot to a tracked milestone and return the new status.
    fn apply(
        &self,
        milestone_id: &MilestoneId,
        submissions: Arc<Vec<SubmissionRecord>>,
        source: ViewSource,
    ) -> Option<DerivedMilestoneStatus> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(milestone_id)?;
        let view = MilestoneView::derive(entry.milestone(), submissions, Utc::now(), source);
        let status = view.status.clone();
        entry.apply_snapshot(view);
        Some(status)
    }

    fn on_change(&self, event: &ChangeEvent) {
        if self.liveness.is_cancelled() {
            return;
        }
        let applied = self.apply(
            &event.milestone_id,
            Arc::new(event.submissions.clone()),
            ViewSource::Event,
        );
        if let Some(status) = applied {
            debug!(
                board = %self.name,
                milestone_id = %event.milestone_id,
                status = %status.status(),
                "Applied change event snapshot"
            );
        }
    }

    fn teardown(&self) {
        if self.liveness.is_cancelled() {
            return;
        }
        self.liveness.cancel();
        self.scheduler.shutdown();
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        info!(board = %self.name, "Milestone board torn down");
    }
}
