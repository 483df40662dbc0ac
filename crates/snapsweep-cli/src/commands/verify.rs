use anyhow::Result;
use clap::Args;
use colored::Colorize;

use snapsweep_core::config::SweepConfig;
use snapsweep_core::credential::Credential;
use snapsweep_core::privilege::SudoExecutor;

use super::read_password;
use crate::cli::Verbosity;

/// Arguments for the `verify` command
#[derive(Args, Debug)]
pub struct VerifyArgs {}

/// Check that the password on stdin grants administrator privileges.
pub async fn run(config: &SweepConfig, _args: VerifyArgs, verbosity: Verbosity) -> Result<()> {
    let raw = read_password()?;
    let executor = SudoExecutor::from_config(config);
    let signatures = config.rejection_signatures();

    let credential = Credential::from_secret(raw)?;
    snapsweep_core::commands::verify::check(&credential, &executor, &signatures).await?;

    if verbosity != Verbosity::Quiet {
        println!("{}", "Password verified.".green());
    }
    Ok(())
}
