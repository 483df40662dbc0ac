use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use snapsweep_core::events::Event;
use snapsweep_core::summary::{
    Classification, MAX_DETAILED_FAILURES, OutcomeKind, RunSummary,
};

use crate::cli::Verbosity;

/// Create a styled progress bar for snapshot deletion.
///
/// `{spinner} [{bar}] {pos}/{len} {msg}`
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Spawn a renderer task with a progress bar.
///
/// Returns an event sender and a join handle. Drop the sender when done
/// to signal the render loop to finish, then await the handle.
pub fn spawn_renderer(
    total: usize,
    verbosity: Verbosity,
) -> (mpsc::UnboundedSender<Event>, JoinHandle<Result<()>>) {
    let pb = (verbosity != Verbosity::Quiet).then(|| create_progress_bar(total as u64, "deleting"));
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move { render_loop(rx, pb, verbosity).await });
    (tx, handle)
}

/// Short label for a settled target.
pub fn outcome_label(kind: OutcomeKind) -> String {
    match kind {
        OutcomeKind::Succeeded => "DELETED".green().to_string(),
        OutcomeKind::Failed => "FAILED".red().to_string(),
        OutcomeKind::AuthRejected => "REJECTED".red().bold().to_string(),
        OutcomeKind::Skipped => "SKIPPED".yellow().to_string(),
    }
}

/// Print above the progress bar when one is drawn, directly otherwise.
///
/// A hidden bar (stdout is not a terminal) swallows `println`, so fall back
/// to plain output there.
fn print_line(pb: Option<&ProgressBar>, line: String, is_stderr: bool) {
    match pb {
        Some(pb) if !pb.is_hidden() => pb.println(line),
        _ if is_stderr => eprintln!("{}", line),
        _ => println!("{}", line),
    }
}

/// Internal render loop that processes events and produces terminal output.
async fn render_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    pb: Option<ProgressBar>,
    verbosity: Verbosity,
) -> Result<()> {
    while let Some(event) = rx.recv().await {
        match event {
            Event::TargetStarted { ref id } => {
                if let Some(ref pb) = pb {
                    pb.set_message(id.clone());
                }
            }
            Event::TargetFinished {
                ref id,
                kind,
                duration,
            } => {
                if verbosity == Verbosity::Verbose {
                    let line = format!(
                        "{} {} {}",
                        outcome_label(kind),
                        id,
                        format!("({:.1}s)", duration.as_secs_f64()).dimmed()
                    );
                    print_line(pb.as_ref(), line, false);
                }
            }
            Event::Progress { completed, .. } => {
                if let Some(ref pb) = pb {
                    pb.set_position(completed as u64);
                }
            }
            Event::Warning(ref msg) => {
                let line = format!("{} {}", "WARNING:".yellow().bold(), msg);
                print_line(pb.as_ref(), line, true);
            }
            Event::RunStarted { .. } => {
                // The caller prints the run header before spawning the renderer.
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(())
}

/// Lines summarizing a finished run: one overall line, up to
/// [`MAX_DETAILED_FAILURES`] failure details, and an overflow notice.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();

    let total = summary.success_count + summary.failure_count;
    let headline = match summary.classification {
        Classification::NoOp => "No snapshots to delete.".yellow().to_string(),
        Classification::AllSucceeded => format!("Deleted all {} snapshot(s).", total)
            .green()
            .to_string(),
        Classification::AllFailed => format!("Failed to delete all {} snapshot(s).", total)
            .red()
            .to_string(),
        Classification::Partial => format!(
            "Deleted {} of {} snapshot(s); {} failed.",
            summary.success_count, total, summary.failure_count
        )
        .yellow()
        .to_string(),
    };
    lines.push(headline);

    let notices = summary.failure_notices(MAX_DETAILED_FAILURES);
    for notice in notices.shown {
        lines.push(format!(
            "  {} {}: {}",
            outcome_label(notice.kind),
            notice.target_id.bold(),
            notice.detail
        ));
    }
    if notices.overflow > 0 {
        lines.push(format!(
            "  {}",
            format!("...and {} more failure(s)", notices.overflow).dimmed()
        ));
    }

    lines
}
