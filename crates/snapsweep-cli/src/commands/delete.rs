use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use snapsweep_core::commands::delete::DeleteOpts;
use snapsweep_core::config::{CONCURRENCY_ENV, SweepConfig};
use snapsweep_core::credential::Credential;
use snapsweep_core::privilege::SudoExecutor;
use snapsweep_core::summary::TaskOutcome;
use snapsweep_core::target::{Target, parse_targets};

use super::read_password;
use crate::cli::Verbosity;
use crate::render::{spawn_renderer, summary_lines};

/// Arguments for the `delete` command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Snapshot identifiers to delete (e.g. 2024-05-01-120000)
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub snapshots: Vec<String>,

    /// Delete every local snapshot reported by `list`
    #[arg(long)]
    pub all: bool,

    /// Maximum number of concurrent deletions (1-5; overrides config)
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Print what would be deleted without asking for a password
    #[arg(long)]
    pub dry_run: bool,

    /// Print the per-snapshot report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Delete the requested snapshots.
///
/// Fails (exit code 1) when any snapshot could not be deleted.
pub async fn run(config: &SweepConfig, args: DeleteArgs, verbosity: Verbosity) -> Result<()> {
    let targets = resolve_targets(config, &args).await?;

    if targets.is_empty() {
        if verbosity != Verbosity::Quiet {
            println!("{}", "No snapshots to delete.".yellow());
        }
        return Ok(());
    }

    let env_concurrency = std::env::var(CONCURRENCY_ENV).ok();
    let (concurrency, warnings) =
        config.effective_concurrency(env_concurrency.as_deref(), args.concurrency);
    for warning in &warnings {
        eprintln!("{} {}", "WARNING:".yellow().bold(), warning);
    }

    if verbosity != Verbosity::Quiet && !args.json {
        println!(
            "Deleting {} snapshot(s) with concurrency {}:\n",
            targets.len().to_string().cyan(),
            concurrency.to_string().cyan(),
        );
        for target in &targets {
            println!("  {} {}", "->".cyan(), target);
        }
        println!();
    }

    if args.dry_run {
        println!("{}", "DRY RUN: no snapshots were deleted.".yellow().bold());
        return Ok(());
    }

    let executor = SudoExecutor::from_config(config);
    let signatures = config.rejection_signatures();

    let raw = read_password()?;
    let credential = Credential::from_secret(raw)?;
    snapsweep_core::commands::verify::check(&credential, &executor, &signatures).await?;

    let total = targets.len();
    let opts = DeleteOpts { concurrency };

    let report = if args.json {
        snapsweep_core::commands::delete::run(
            targets,
            credential,
            &executor,
            &signatures,
            &opts,
            None,
        )
        .await
    } else {
        let (tx, render_handle) = spawn_renderer(total, verbosity);
        let report = snapsweep_core::commands::delete::run(
            targets,
            credential,
            &executor,
            &signatures,
            &opts,
            Some(&tx),
        )
        .await;
        drop(tx);
        render_handle.await??;
        report
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in summary_lines(&report.summary) {
            println!("{}", line);
        }
    }

    if !report.summary.is_success() {
        let password_rejected = report
            .outcomes
            .iter()
            .filter_map(TaskOutcome::error)
            .any(|e| e.is_auth_rejection());
        anyhow::bail!(
            "{} snapshot(s) could not be deleted ({} deleted){}",
            report.summary.failure_count,
            report.summary.success_count,
            if password_rejected {
                "; password was rejected"
            } else {
                ""
            }
        );
    }

    Ok(())
}

async fn resolve_targets(config: &SweepConfig, args: &DeleteArgs) -> Result<Vec<Target>> {
    if args.all {
        return snapsweep_core::commands::list::run(config)
            .await
            .context("Failed to list local snapshots");
    }
    Ok(parse_targets(args.snapshots.iter().cloned())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DeleteArgs,
    }

    #[test]
    fn test_delete_args_defaults() {
        let cli = TestCli::parse_from(["test", "2024-05-01-120000"]);
        assert_eq!(cli.args.snapshots, vec!["2024-05-01-120000"]);
        assert!(!cli.args.all);
        assert!(cli.args.concurrency.is_none());
        assert!(!cli.args.dry_run);
        assert!(!cli.args.json);
    }

    #[test]
    fn test_delete_args_all_flags() {
        let cli = TestCli::parse_from(["test", "--all", "-c", "2", "--dry-run", "--json"]);
        assert!(cli.args.all);
        assert_eq!(cli.args.concurrency, Some(2));
        assert!(cli.args.dry_run);
        assert!(cli.args.json);
    }

    #[test]
    fn test_delete_requires_snapshots_or_all() {
        assert!(TestCli::try_parse_from(["test"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--all", "x"]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_targets_rejects_unsafe_ids() {
        let cli = TestCli::parse_from(["test", "ok-1", "bad;id"]);
        let err = resolve_targets(&SweepConfig::default(), &cli.args)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid snapshot identifier"));
    }
}
