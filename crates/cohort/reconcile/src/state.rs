//! Per-milestone load state machine.
//!
//! ```text
//!              begin_load                finish_load
//!   Unloaded ─────────────▶ Loading ─────────────────▶ Loaded
//!      ▲                     │  │ ▲                      │
//!      └──── abandon_load ───┘  │ └──── begin_load ──────┤
//!                               │ fail_load              │
//!                               ▼                        │
//!                             Error ◀────────────────────┘
//!
//!   apply_snapshot: any state ──▶ Loaded
//!   abandon_load:   Loading   ──▶ the state the load started from
//! ```
//!
//! Every applied change bumps the entry's revision. A load remembers the
//! revision it started at; if anything was applied meanwhile (typically a
//! change-event snapshot), its result is stale and gets discarded.

use chrono::{DateTime, Utc};
use cohort_status::{DerivedMilestoneStatus, StatusDeriver};
use cohort_submissions::{SubmissionError, Submissions};
use cohort_types::{Milestone, MilestoneId, SubmissionRecord};
use serde::Serialize;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

/// How a view's data was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSource {
    /// Resolved through the submission checker.
    Fetch,
    /// Recomputed from a change-event snapshot.
    Event,
    /// Applied locally by the board that created the submission.
    LocalWrite,
}

/// A milestone as a view shows it: derived status plus the submissions it
/// was derived from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneView {
    pub status: DerivedMilestoneStatus,
    #[serde(skip)]
    pub submissions: Submissions,
    pub source: ViewSource,
}

impl MilestoneView {
    /// Derive a view. The status is always recomputed whole.
    pub fn derive(
        milestone: &Milestone,
        submissions: Submissions,
        now: DateTime<Utc>,
        source: ViewSource,
    ) -> Self {
        Self {
            status: StatusDeriver::compute(milestone, &submissions, now),
            submissions,
            source,
        }
    }

    pub fn submissions(&self) -> &[SubmissionRecord] {
        self.submissions.as_slice()
    }
}

/// Load state of one milestone.
#[derive(Debug, Clone)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded(MilestoneView),
    Error(SubmissionError),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loading => "loading",
            LoadState::Loaded(_) => "loaded",
            LoadState::Error(_) => "error",
        }
    }

    pub fn view(&self) -> Option<&MilestoneView> {
        match self {
            LoadState::Loaded(view) => Some(view),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        match self {
            LoadState::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Proof that a load was started, checked when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    milestone_id: MilestoneId,
    revision: u64,
}

impl LoadTicket {
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Outcome of completing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Something newer was applied while the load was running.
    Stale,
}

/// A tracked milestone and its load state.
#[derive(Debug, Clone)]
pub struct MilestoneEntry {
    milestone: Milestone,
    state: LoadState,
    revision: u64,
    last_view: Option<MilestoneView>,
    /// State to return to if every running load is abandoned.
    before_load: Option<LoadState>,
    loads_in_flight: usize,
}

impl MilestoneEntry {
    pub fn new(milestone: Milestone) -> Self {
        Self {
            milestone,
            state: LoadState::Unloaded,
            revision: 0,
            last_view: None,
            before_load: None,
            loads_in_flight: 0,
        }
    }

    pub fn milestone(&self) -> &Milestone {
        &self.milestone
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The most recent view, kept visible while a reload runs or after it fails.
    pub fn last_view(&self) -> Option<&MilestoneView> {
        self.state.view().or(self.last_view.as_ref())
    }

    /// Enter `Loading`. Legal from every state; a second load while one is
    /// running simply shares the revision.
    pub fn begin_load(&mut self) -> LoadTicket {
        if !self.state.is_loading() {
            self.before_load = Some(std::mem::replace(&mut self.state, LoadState::Loading));
        }
        self.loads_in_flight += 1;
        LoadTicket {
            milestone_id: self.milestone.id.clone(),
            revision: self.revision,
        }
    }

    /// `Loading -> Loaded`, unless the ticket is stale.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        view: MilestoneView,
    ) -> ReconcileResult<Transition> {
        if self.check_ticket(ticket, "loaded")? == Transition::Stale {
            return Ok(Transition::Stale);
        }
        self.set_loaded(view);
        Ok(Transition::Applied)
    }

    /// `Loading -> Error`, unless the ticket is stale.
    pub fn fail_load(
        &mut self,
        ticket: &LoadTicket,
        error: SubmissionError,
    ) -> ReconcileResult<Transition> {
        if self.check_ticket(ticket, "error")? == Transition::Stale {
            return Ok(Transition::Stale);
        }
        self.state = LoadState::Error(error);
        self.before_load = None;
        self.revision += 1;
        Ok(Transition::Applied)
    }

    /// Give up on a load without a result.
    ///
    /// Once no other load is running the entry returns to the state the
    /// load started from. Returns `Stale` when something newer was applied
    /// meanwhile, in which case nothing changes.
    pub fn abandon_load(&mut self, ticket: &LoadTicket) -> ReconcileResult<Transition> {
        if self.check_ticket(ticket, "abandoned")? == Transition::Stale {
            return Ok(Transition::Stale);
        }
        if self.loads_in_flight == 0 {
            self.state = self.before_load.take().unwrap_or(LoadState::Unloaded);
        }
        Ok(Transition::Applied)
    }

    /// Any state `-> Loaded` from a snapshot. Invalidates running loads.
    pub fn apply_snapshot(&mut self, view: MilestoneView) {
        self.set_loaded(view);
    }

    /// Number of loads started and not yet finished, failed or abandoned.
    pub fn loads_in_flight(&self) -> usize {
        self.loads_in_flight
    }

    fn set_loaded(&mut self, view: MilestoneView) {
        self.last_view = Some(view.clone());
        self.state = LoadState::Loaded(view);
        self.before_load = None;
        self.revision += 1;
    }

    /// Validate a ticket and retire it from the in-flight count.
    fn check_ticket(&mut self, ticket: &LoadTicket, to: &'static str) -> ReconcileResult<Transition> {
        if ticket.milestone_id != self.milestone.id {
            return Err(ReconcileError::InvalidTransition {
                milestone_id: self.milestone.id.clone(),
                from: self.state.label(),
                to,
            });
        }
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        if ticket.revision != self.revision {
            debug!(
                milestone_id = %self.milestone.id,
                started_at = ticket.revision,
                current = self.revision,
                "Discarding stale load result"
            );
            return Ok(Transition::Stale);
        }
        match self.state {
            LoadState::Loading => Ok(Transition::Applied),
            _ => Err(ReconcileError::InvalidTransition {
                milestone_id: self.milestone.id.clone(),
                from: self.state.label(),
                to,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cohort_status::MilestoneStatus;
    use std::sync::Arc;

    fn milestone() -> Milestone {
        Milestone::new("m1", "Prototype").with_due_date(Utc::now() - Duration::days(1))
    }

    fn view(subs: Vec<SubmissionRecord>, source: ViewSource) -> MilestoneView {
        MilestoneView::derive(&milestone(), Arc::new(subs), Utc::now(), source)
    }

    fn submission() -> SubmissionRecord {
        SubmissionRecord::new("s1", "m1", "t1", Utc::now())
    }

    #[test]
    fn test_load_cycle() {
        let mut entry = MilestoneEntry::new(milestone());
        assert_eq!(entry.state().label(), "unloaded");

        let ticket = entry.begin_load();
        assert!(entry.state().is_loading());

        let applied = entry.finish_load(&ticket, view(Vec::new(), ViewSource::Fetch)).unwrap();
        assert_eq!(applied, Transition::Applied);
        assert_eq!(
            entry.state().view().unwrap().status.status(),
            MilestoneStatus::Late
        );
    }

    #[test]
    fn test_snapshot_during_load_discards_fetch_result() {
        let mut entry = MilestoneEntry::new(milestone());
        let ticket = entry.begin_load();

        entry.apply_snapshot(view(vec![submission()], ViewSource::Event));
        let outcome = entry.finish_load(&ticket, view(Vec::new(), ViewSource::Fetch)).unwrap();

        assert_eq!(outcome, Transition::Stale);
        let shown = entry.state().view().unwrap();
        assert_eq!(shown.status.status(), MilestoneStatus::Completed);
        assert_eq!(shown.source, ViewSource::Event);
    }

    #[test]
    fn test_failure_keeps_last_view_available() {
        let mut entry = MilestoneEntry::new(milestone());
        let first = entry.begin_load();
        entry.finish_load(&first, view(vec![submission()], ViewSource::Fetch)).unwrap();

        let second = entry.begin_load();
        assert!(entry.last_view().is_some());
        entry
            .fail_load(&second, SubmissionError::Network("timeout".into()))
            .unwrap();

        assert!(entry.state().error().is_some());
        assert!(entry.last_view().unwrap().status.is_completed());
    }

    #[test]
    fn test_overlapping_loads_apply_once() {
        let mut entry = MilestoneEntry::new(milestone());
        let a = entry.begin_load();
        let b = entry.begin_load();

        assert_eq!(
            entry.finish_load(&a, view(Vec::new(), ViewSource::Fetch)).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            entry.finish_load(&b, view(Vec::new(), ViewSource::Fetch)).unwrap(),
            Transition::Stale
        );
    }

    #[test]
    fn test_foreign_ticket_is_invalid() {
        let mut entry = MilestoneEntry::new(milestone());
        let mut other = MilestoneEntry::new(Milestone::new("m2", "Demo"));
        let ticket = other.begin_load();
        entry.begin_load();

        let err = entry
            .finish_load(&ticket, view(Vec::new(), ViewSource::Fetch))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidTransition { .. }));
    }

    #[test]
    fn test_abandoned_load_restores_previous_state() {
        let mut entry = MilestoneEntry::new(milestone());
        let first = entry.begin_load();
        entry.finish_load(&first, view(vec![submission()], ViewSource::Fetch)).unwrap();

        let second = entry.begin_load();
        assert!(entry.state().is_loading());
        assert_eq!(entry.abandon_load(&second).unwrap(), Transition::Applied);

        assert_eq!(entry.state().label(), "loaded");
        assert!(entry.state().view().unwrap().status.is_completed());
        assert_eq!(entry.loads_in_flight(), 0);
    }

    #[test]
    fn test_abandon_waits_for_overlapping_load() {
        let mut entry = MilestoneEntry::new(milestone());
        let a = entry.begin_load();
        let b = entry.begin_load();

        entry.abandon_load(&a).unwrap();
        assert!(entry.state().is_loading());

        assert_eq!(
            entry.finish_load(&b, view(Vec::new(), ViewSource::Fetch)).unwrap(),
            Transition::Applied
        );
        assert_eq!(entry.state().label(), "loaded");
    }

    #[test]
    fn test_abandon_after_snapshot_is_stale() {
        let mut entry = MilestoneEntry::new(milestone());
        let ticket = entry.begin_load();
        entry.apply_snapshot(view(vec![submission()], ViewSource::Event));

        assert_eq!(entry.abandon_load(&ticket).unwrap(), Transition::Stale);
        assert_eq!(entry.state().label(), "loaded");
        assert_eq!(entry.loads_in_flight(), 0);
    }
}
