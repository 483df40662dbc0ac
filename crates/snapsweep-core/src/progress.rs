use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Live progress of a deletion run, shared by all concurrent tasks.
///
/// `completed` only moves forward, once per settled target, and is capped at
/// `total`. The in-flight set is informational (what to show as "current").
#[derive(Debug)]
pub struct RunProgress {
    total: usize,
    completed: AtomicUsize,
    in_flight: Mutex<BTreeSet<String>>,
}

/// Point-in-time copy of [`RunProgress`] for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub in_flight: Vec<String>,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Mark a target as running.
    pub fn begin(&self, id: &str) {
        self.lock_in_flight().insert(id.to_string());
    }

    /// Number of targets currently running.
    pub fn running(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Mark a target as settled and return the new completed count.
    ///
    /// Works for targets that never called [`begin`](Self::begin) (skips).
    pub fn settle(&self, id: &str) -> usize {
        self.lock_in_flight().remove(id);
        let total = self.total;
        match self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < total).then_some(n + 1)
            }) {
            Ok(prev) => prev + 1,
            Err(current) => current,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let in_flight = self.lock_in_flight().iter().cloned().collect();
        ProgressSnapshot {
            completed: self.completed(),
            total: self.total,
            in_flight,
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, BTreeSet<String>> {
        // The set holds display data only; a panicked holder cannot leave it
        // in a state worth refusing to read.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
