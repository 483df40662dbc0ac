use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::classify::RejectionSignatures;
use crate::credential::Credential;
use crate::events::{Event, emit};
use crate::privilege::{CommandOutput, PrivilegedExecutor};
use crate::progress::RunProgress;
use crate::runner::BoundedRunner;
use crate::summary::{RunSummary, TaskOutcome, summarize};
use crate::target::Target;

/// Options for a deletion run (clap-free).
#[derive(Debug, Clone)]
pub struct DeleteOpts {
    /// Maximum deletions in flight; already resolved and clamped by the caller.
    pub concurrency: usize,
}

/// Per-target outcomes in input order plus the derived summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<TaskOutcome>,
    pub summary: RunSummary,
}

/// State shared by every task of one run.
struct TaskContext<'a, E> {
    executor: &'a E,
    credential: &'a Credential,
    signatures: &'a RejectionSignatures,
    progress: &'a RunProgress,
    auth_failed: &'a AtomicBool,
    events: Option<&'a UnboundedSender<Event>>,
}

/// Delete every target with bounded concurrency.
///
/// The credential is consumed and wiped when the run ends. Per-target
/// failures are recorded as outcomes; nothing short of a panic makes this
/// return early. Once any deletion is rejected for authentication, targets
/// that have not started yet are skipped while in-flight ones finish.
pub async fn run<E: PrivilegedExecutor>(
    targets: Vec<Target>,
    credential: Credential,
    executor: &E,
    signatures: &RejectionSignatures,
    opts: &DeleteOpts,
    events: Option<&UnboundedSender<Event>>,
) -> BatchReport {
    let total = targets.len();
    let runner = BoundedRunner::new(opts.concurrency);

    if total == 0 {
        info!("no snapshots to delete");
        return BatchReport {
            outcomes: Vec::new(),
            summary: summarize(&[]),
        };
    }

    info!(
        total,
        concurrency = runner.limit(),
        "starting snapshot deletion"
    );
    emit(
        events,
        Event::RunStarted {
            total,
            concurrency: runner.limit(),
        },
    );

    let progress = RunProgress::new(total);
    let auth_failed = AtomicBool::new(false);
    let ctx = TaskContext {
        executor,
        credential: &credential,
        signatures,
        progress: &progress,
        auth_failed: &auth_failed,
        events,
    };

    let outcomes = runner
        .run(targets, |target, _index| delete_one(&ctx, target))
        .await;

    drop(credential);

    let summary = summarize(&outcomes);
    info!(
        succeeded = summary.success_count,
        failed = summary.failure_count,
        classification = ?summary.classification,
        "snapshot deletion finished"
    );

    BatchReport { outcomes, summary }
}

async fn delete_one<E: PrivilegedExecutor>(ctx: &TaskContext<'_, E>, target: Target) -> TaskOutcome {
    let id = target.id();

    // A task that has not started yet when the flag flips is skipped. Tasks
    // that passed this check before the flip still run; that small overlap is
    // accepted.
    if ctx.auth_failed.load(Ordering::Acquire) {
        debug!(target_id = id, "skipping after authentication failure");
        let outcome = TaskOutcome::skipped(id);
        settle(ctx, &outcome, Duration::ZERO);
        return outcome;
    }

    ctx.progress.begin(id);
    emit(ctx.events, Event::TargetStarted { id: id.to_string() });
    debug!(target_id = id, "deleting snapshot");

    let start = Instant::now();
    let output = ctx.executor.delete(&target, ctx.credential).await;
    let outcome = classify(ctx, id, output);

    settle(ctx, &outcome, start.elapsed());
    outcome
}

fn classify<E>(ctx: &TaskContext<'_, E>, id: &str, output: CommandOutput) -> TaskOutcome {
    if output.success {
        return TaskOutcome::succeeded(id);
    }

    let diagnostic = output.diagnostic();
    if ctx.signatures.is_auth_rejection(&diagnostic) {
        if !ctx.auth_failed.swap(true, Ordering::AcqRel) {
            warn!(
                target_id = id,
                "password rejected; remaining snapshots will be skipped"
            );
            emit(
                ctx.events,
                Event::Warning("Password rejected; skipping remaining snapshots".into()),
            );
        }
        return TaskOutcome::auth_rejected(id, diagnostic);
    }

    warn!(
        target_id = id,
        exit_code = ?output.exit_code,
        diagnostic = %diagnostic,
        "snapshot deletion failed"
    );
    TaskOutcome::failed(id, diagnostic)
}

fn settle<E>(ctx: &TaskContext<'_, E>, outcome: &TaskOutcome, duration: Duration) {
    let completed = ctx.progress.settle(&outcome.target_id);
    emit(
        ctx.events,
        Event::TargetFinished {
            id: outcome.target_id.clone(),
            kind: outcome.kind,
            duration,
        },
    );
    emit(
        ctx.events,
        Event::Progress {
            completed,
            total: ctx.progress.total(),
            current: outcome.target_id.clone(),
        },
    );
}
