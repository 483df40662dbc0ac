use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::config::SweepConfig;
use crate::target::Target;

/// Snapshot dates as printed by `tmutil listlocalsnapshotdates`.
static SNAPSHOT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    // safety: the pattern is a compile-time constant
    Regex::new(r"^\d{4}-\d{2}-\d{2}-\d{6}$").expect("valid snapshot date regex")
});

/// Keep the lines of listing output that are snapshot identifiers, in order.
///
/// Header lines and anything else are ignored.
pub fn parse_listing(output: &str) -> Vec<Target> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| SNAPSHOT_DATE.is_match(line))
        .filter_map(|line| Target::new(line).ok())
        .collect()
}

/// Ask the snapshot tool (unprivileged) for the current local snapshots.
pub async fn run(config: &SweepConfig) -> Result<Vec<Target>> {
    let tool = config.tool_program();
    let args = config.list_args();
    debug!(tool, ?args, "listing local snapshots");

    let output = Command::new(tool)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("Failed to run {}", tool))?;

    if !output.status.success() {
        bail!(
            "{} {} failed: {}",
            tool,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let targets = parse_listing(&String::from_utf8_lossy(&output.stdout));
    debug!(count = targets.len(), "found local snapshots");
    Ok(targets)
}
