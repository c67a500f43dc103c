//! Submission command

use std::time::Duration;

use cohort_reconcile::MilestoneBoard;
use cohort_types::{Milestone, MilestoneId, NewSubmission, ProgramId};
use tracing::debug;

use super::Context;
use crate::error::{CliError, CliResult};
use crate::output::{colorize_status, print_info, print_single, print_success, print_warning, OutputFormat};

/// Arguments of `cohort submit`.
pub struct SubmitArgs {
    pub milestone: MilestoneId,
    pub program: Option<ProgramId>,
    pub link: Option<String>,
    pub files: Vec<String>,
    pub comments: String,
}

impl SubmitArgs {
    fn draft(&self, ctx: &Context) -> CliResult<NewSubmission> {
        let mut draft = NewSubmission::new(ctx.team()?, self.milestone.clone())
            .with_comments(self.comments.clone());
        for url in &self.files {
            draft = draft.with_file_url(url.clone());
        }
        if let Some(link) = &self.link {
            draft = draft.with_link(link.clone());
        }

        if !draft.has_evidence() {
            return Err(CliError::InvalidInput(
                "pass at least one --file or a --link".into(),
            ));
        }
        Ok(draft)
    }
}

/// Create a submission, then wait for the reconciliation cascade and report
/// the verified status.
pub async fn execute(ctx: &Context, args: SubmitArgs) -> CliResult<()> {
    let draft = args.draft(ctx)?;
    let milestone = resolve_milestone(ctx, &args).await?;

    let board = MilestoneBoard::mount("submit", ctx.team()?, vec![milestone], &ctx.deps);
    board.load(&args.milestone, false).await?;

    let local = board.submit(draft).await?;
    print_success(&format!(
        "Submitted to {} ({})",
        args.milestone.as_str(),
        colorize_status(local.status())
    ));

    print_info("Verifying against the record store...");
    wait_for_reconciliation(&board, ctx.deps.reconcile.settle_window()).await;

    let verified = board.status(&args.milestone);
    if let Some(error) = board.state(&args.milestone).and_then(|s| s.error().cloned()) {
        print_warning(&format!("Verification failed: {}", error));
    }

    match verified {
        Some(status) if !matches!(ctx.format, OutputFormat::Table) => print_single(&status, ctx.format),
        Some(status) => {
            println!("Verified status: {}", colorize_status(status.status()));
            Ok(())
        }
        None => Err(CliError::NotFound(format!("status for {}", args.milestone.as_str()))),
    }
}

async fn resolve_milestone(ctx: &Context, args: &SubmitArgs) -> CliResult<Milestone> {
    let Some(program) = &args.program else {
        return Ok(Milestone::new(args.milestone.clone(), args.milestone.as_str()));
    };

    ctx.milestones(program)
        .await?
        .into_iter()
        .find(|m| m.id == args.milestone)
        .ok_or_else(|| {
            CliError::NotFound(format!("{} in {}", args.milestone.as_str(), program.as_str()))
        })
}

/// Wait until no cascade is pending, giving up after twice the settle window.
async fn wait_for_reconciliation(board: &MilestoneBoard, settle_window: Duration) {
    let poll = Duration::from_millis(50);
    let deadline = tokio::time::Instant::now() + settle_window * 2 + poll;

    while !board.pending_reconciliation().is_empty() {
        if tokio::time::Instant::now() >= deadline {
            debug!("Reconciliation still pending; reporting last known status");
            break;
        }
        tokio::time::sleep(poll).await;
    }
}
