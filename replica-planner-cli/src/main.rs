mod plan;
mod snapshot;
mod usage;

use plan::Plan;
use usage::Usage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use replica_planner::planner_metrics::describe_metrics;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "replica-planner-cli")]
#[command(about = "Plan partition replica reassignments from a cluster snapshot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Compute new replica lists for the selected partitions")]
    Plan(Plan),
    #[command(about = "Show the current replica, leader and size counters of every broker")]
    Usage(Usage),
}

fn main() -> Result<()> {
    // Logs go to stderr so the plan on stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    describe_metrics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan(plan) => plan::handle_command(plan)?,
        Commands::Usage(usage) => usage::handle_command(usage)?,
    }

    Ok(())
}
