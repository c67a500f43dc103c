//! Milestone status listing

use cohort_reconcile::BoardRow;
use cohort_types::ProgramId;
use colored::*;
use tabled::Tabled;

use super::Context;
use crate::error::CliResult;
use crate::output::{colorize_status, print_output, print_warning};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "MILESTONE")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "DUE")]
    due: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "FILES")]
    attachments: String,
    #[tabled(rename = "LAST SUBMITTED")]
    latest: String,
}

impl From<&BoardRow> for StatusRow {
    fn from(row: &BoardRow) -> Self {
        let due = match (row.milestone.due_date, row.milestone.invalid_due_date) {
            (Some(due), _) => due.format("%Y-%m-%d").to_string(),
            (None, true) => "invalid".dimmed().to_string(),
            (None, false) => "-".to_string(),
        };

        let (status, attachments, latest) = match (&row.status, &row.error) {
            (_, Some(error)) => (format!("{} ({})", "error".red(), error), "-".into(), "-".into()),
            (Some(status), None) => (
                colorize_status(status.status()).to_string(),
                status.attachment_count().to_string(),
                status
                    .latest_submission()
                    .map(|s| s.resolved_time().format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            (None, None) => (row.state.dimmed().to_string(), "-".into(), "-".into()),
        };

        Self {
            id: row.milestone.id.as_str().to_string(),
            name: row.milestone.name.clone(),
            due,
            status,
            attachments,
            latest,
        }
    }
}

/// List every milestone of a program with its derived status.
pub async fn execute(ctx: &Context, program: ProgramId, force: bool) -> CliResult<()> {
    let board = ctx.mount_program("status", &program).await?;
    board.load_all(force).await?;

    let rows = board.rows();
    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    let table: Vec<StatusRow> = rows.iter().map(StatusRow::from).collect();
    print_output(table, &rows, ctx.format)?;

    if failed > 0 {
        print_warning(&format!(
            "{} milestone(s) could not be checked; their status is unknown",
            failed
        ));
    }
    Ok(())
}
