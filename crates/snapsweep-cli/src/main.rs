mod cli;
mod commands;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Verbosity};
use colored::Colorize;
use snapsweep_core::config::SweepConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // `completion` needs neither config nor logging
    if let Commands::Completion(args) = cli.command {
        clap_complete::generate(
            args.shell,
            &mut <Cli as clap::CommandFactory>::command(),
            "snapsweep",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let log_guard = logging::init(verbosity);

    let loaded = match SweepConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{} Failed to load config: {:#}", "ERROR".red().bold(), e);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    if verbosity == Verbosity::Verbose {
        match loaded.source {
            Some(ref path) => println!("{} config from {}", "DEBUG".dimmed(), path.display()),
            None => println!("{} no config file, using defaults", "DEBUG".dimmed()),
        }
        println!(
            "{} logging to {}",
            "DEBUG".dimmed(),
            logging::log_dir().display()
        );
    }

    let config = loaded.config;
    let result = match cli.command {
        Commands::List(args) => commands::list::run(&config, args, verbosity).await,
        Commands::Verify(args) => commands::verify::run(&config, args, verbosity).await,
        Commands::Delete(args) => commands::delete::run(&config, args, verbosity).await,
        Commands::Completion(_) => unreachable!("completion handled above"),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("\n{} {}", "FAILED".red().bold(), e);
            // exit() skips destructors; flush buffered log records first
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
