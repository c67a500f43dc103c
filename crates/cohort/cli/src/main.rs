//! Cohort CLI - terminal view of milestone status
//!
//! A view adapter over the reconciliation engine:
//! - List a program's milestones with their derived status
//! - Show the summary card for a team
//! - Submit work for a milestone and wait for the backend to confirm it

use clap::{Parser, Subcommand};
use cohort_submissions::RecordStoreClient;
use cohort_types::{MilestoneId, ProgramId, TeamId};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{status, submit, summary, Context};
use config::{CliConfig, DEFAULT_ENDPOINT};
use error::CliResult;

/// Cohort CLI application
#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Cohort - milestone status for program teams", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "COHORT_CONFIG")]
    config: Option<String>,

    /// Record store API endpoint
    #[arg(short, long, env = "COHORT_ENDPOINT")]
    endpoint: Option<String>,

    /// Team to act for
    #[arg(short, long, env = "COHORT_TEAM")]
    team: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// List milestones with their status
    Status {
        /// Program ID
        #[arg(short, long)]
        program: String,

        /// Bypass the submission cache
        #[arg(short, long)]
        force: bool,
    },

    /// Show status counts and the next milestone due
    Summary {
        /// Program ID
        #[arg(short, long)]
        program: String,
    },

    /// Submit work for a milestone
    Submit {
        /// Milestone ID
        #[arg(short, long)]
        milestone: String,

        /// Program ID, to show the milestone's name and due date
        #[arg(short, long)]
        program: Option<String>,

        /// Link to the work
        #[arg(short, long)]
        link: Option<String>,

        /// Uploaded file URL (repeatable)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Comments for reviewers
        #[arg(long, default_value = "")]
        comments: String,
    },

    /// Show configuration
    Config,
}

/// Effective configuration, as printed by `cohort config`.
#[derive(Serialize)]
struct EffectiveConfig<'a> {
    endpoint: &'a str,
    team: Option<&'a str>,
    file: &'a CliConfig,
    engine: cohort_reconcile::EngineConfig,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    let result = match runtime {
        Ok(runtime) => runtime.block_on(run(cli)),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    // Load config
    let config = CliConfig::load(cli.config.as_deref())?;
    let endpoint = cli
        .endpoint
        .or_else(|| config.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let team = cli.team.or_else(|| config.team.clone());
    let engine = config.engine_config();

    if let Commands::Config = cli.command {
        return output::print_single(
            &EffectiveConfig {
                endpoint: &endpoint,
                team: team.as_deref(),
                file: &config,
                engine,
            },
            cli.output,
        );
    }

    let client = RecordStoreClient::new(&config.client_config(&endpoint))?;
    let ctx = Context::new(client, &engine, team.map(TeamId::new), cli.output);

    match cli.command {
        Commands::Status { program, force } => {
            status::execute(&ctx, ProgramId::new(program), force).await
        }
        Commands::Summary { program } => summary::execute(&ctx, ProgramId::new(program)).await,
        Commands::Submit {
            milestone,
            program,
            link,
            files,
            comments,
        } => {
            let args = submit::SubmitArgs {
                milestone: MilestoneId::new(milestone),
                program: program.map(ProgramId::new),
                link,
                files,
                comments,
            };
            submit::execute(&ctx, args).await
        }
        Commands::Config => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_collects_repeated_files() {
        let cli = Cli::try_parse_from([
            "cohort",
            "--team",
            "t1",
            "submit",
            "--milestone",
            "m1",
            "--file",
            "https://files.example/a.pdf",
            "--file",
            "https://files.example/b.pdf",
        ])
        .unwrap();

        match cli.command {
            Commands::Submit { files, link, .. } => {
                assert_eq!(files.len(), 2);
                assert!(link.is_none());
            }
            _ => panic!("expected submit"),
        }
    }
}
