use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::summary::OutcomeKind;

/// Events emitted by the batch orchestrator while a run is in progress.
///
/// These decouple the deletion engine from the presentation layer so a
/// progress bar, a JSON writer, or a test can consume the same stream.
#[derive(Debug, Clone)]
pub enum Event {
    /// A deletion run is about to start.
    RunStarted { total: usize, concurrency: usize },
    /// A privileged deletion has been started for a snapshot.
    TargetStarted { id: String },
    /// A snapshot's task has settled (including skips).
    TargetFinished {
        id: String,
        kind: OutcomeKind,
        duration: Duration,
    },
    /// Completed count after a task settled, with the target that just settled.
    Progress {
        completed: usize,
        total: usize,
        current: String,
    },
    /// A warning message.
    Warning(String),
}

/// Send an event if the transmitter is present, ignoring send errors
/// (the receiver may have been dropped).
pub fn emit(tx: Option<&UnboundedSender<Event>>, event: Event) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
