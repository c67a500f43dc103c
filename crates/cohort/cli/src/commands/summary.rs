//! Program summary card

use cohort_types::ProgramId;
use colored::*;

use super::Context;
use crate::error::CliResult;
use crate::output::{print_single, OutputFormat};

/// Show counts per status and the next milestone due.
pub async fn execute(ctx: &Context, program: ProgramId) -> CliResult<()> {
    let board = ctx.mount_program("summary", &program).await?;
    board.load_all(false).await?;
    let summary = board.summary();

    if !matches!(ctx.format, OutputFormat::Table) {
        return print_single(&summary, ctx.format);
    }

    println!("Program {} - team {}", program.as_str().bold(), board.team_id().as_str());
    println!("--------------------");
    println!("Milestones: {}", summary.total);
    println!("Completed:  {}", summary.completed.to_string().green());
    println!("Upcoming:   {}", summary.upcoming.to_string().yellow());
    println!("Late:       {}", summary.late.to_string().red());
    if summary.errored > 0 {
        println!("Unchecked:  {}", summary.errored.to_string().dimmed());
    }
    match &summary.next_due {
        Some(next) => println!(
            "Next due:   {} ({})",
            next.name,
            next.due_date.format("%Y-%m-%d")
        ),
        None => println!("Next due:   {}", "nothing scheduled".dimmed()),
    }
    Ok(())
}
