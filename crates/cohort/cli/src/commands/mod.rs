//! CLI command implementations

pub mod status;
pub mod submit;
pub mod summary;

use std::sync::Arc;

use cohort_reconcile::{BoardDeps, EngineConfig, MilestoneBoard};
use cohort_submissions::RecordStoreClient;
use cohort_types::{Milestone, ProgramId, TeamId};
use tracing::debug;

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;

/// Everything a command needs: the record store and the engine over it.
pub struct Context {
    pub client: Arc<RecordStoreClient>,
    pub deps: BoardDeps,
    pub team: Option<TeamId>,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(
        client: RecordStoreClient,
        engine: &EngineConfig,
        team: Option<TeamId>,
        format: OutputFormat,
    ) -> Self {
        let client = Arc::new(client);
        Self {
            deps: BoardDeps::new(client.clone(), engine),
            client,
            team,
            format,
        }
    }

    pub fn team(&self) -> CliResult<TeamId> {
        self.team.clone().ok_or_else(|| {
            CliError::Config("no team configured; pass --team or set COHORT_TEAM".into())
        })
    }

    /// Fetch a program's milestones from the record store.
    pub async fn milestones(&self, program: &ProgramId) -> CliResult<Vec<Milestone>> {
        let milestones = self.client.list_milestones(program).await?;
        debug!(program_id = %program, count = milestones.len(), "Fetched milestones");
        Ok(milestones)
    }

    /// Mount a board over a program's milestones for the configured team.
    pub async fn mount_program(&self, name: &str, program: &ProgramId) -> CliResult<MilestoneBoard> {
        let team = self.team()?;
        let milestones = self.milestones(program).await?;
        Ok(MilestoneBoard::mount(name, team, milestones, &self.deps))
    }
}
