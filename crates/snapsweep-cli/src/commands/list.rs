use anyhow::Result;
use clap::Args;
use colored::Colorize;

use snapsweep_core::config::SweepConfig;
use snapsweep_core::target::Target;

use crate::cli::Verbosity;

/// Arguments for the `list` command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// List the local snapshots reported by the snapshot tool
pub async fn run(config: &SweepConfig, args: ListArgs, verbosity: Verbosity) -> Result<()> {
    let targets = snapsweep_core::commands::list::run(config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    print_targets(&targets, verbosity);
    Ok(())
}

fn print_targets(targets: &[Target], verbosity: Verbosity) {
    if targets.is_empty() {
        if verbosity != Verbosity::Quiet {
            println!("{}", "No local snapshots found.".yellow());
        }
        return;
    }

    if verbosity != Verbosity::Quiet {
        println!(
            "{} local snapshot(s):\n",
            targets.len().to_string().cyan()
        );
    }
    for target in targets {
        println!("{}", target);
    }
}
