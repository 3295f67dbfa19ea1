//! Per-step completion bookkeeping

use tracing::debug;

/// Tally of which workers have reported for the current step
///
/// Sized to the worker count at creation. Purely diagnostic: a round is
/// gated by the coordinator's bounded collect, not by this tally, so the
/// tracker never blocks. Reset once per step before responses are recorded.
#[derive(Debug)]
pub struct StepTracker {
    completed: Vec<bool>,
    succeeded: Vec<bool>,
}

impl StepTracker {
    pub fn new(workers: usize) -> Self {
        Self {
            completed: vec![false; workers],
            succeeded: vec![false; workers],
        }
    }

    /// Number of workers this tracker was sized for
    pub fn worker_count(&self) -> usize {
        self.completed.len()
    }

    /// Clear all per-worker flags for a new step
    pub fn reset(&mut self) {
        self.completed.fill(false);
        self.succeeded.fill(false);
    }

    /// Record that a worker finished the current step
    ///
    /// `success` means it reported the expected completion message type.
    /// Out-of-range indices are ignored; the first report per worker wins.
    pub fn record(&mut self, index: usize, success: bool) {
        if index >= self.completed.len() {
            debug!(index, "StepTracker::record: index out of range, ignoring");
            return;
        }
        if !self.completed[index] {
            self.completed[index] = true;
            self.succeeded[index] = success;
        }
    }

    /// How many workers have reported for this step
    pub fn done_count(&self) -> usize {
        self.completed.iter().filter(|&&done| done).count()
    }

    /// How many workers reported success for this step
    pub fn success_count(&self) -> usize {
        self.succeeded.iter().filter(|&&ok| ok).count()
    }

    /// True only if every worker reported, and successfully
    pub fn all_succeeded(&self) -> bool {
        self.succeeded.iter().all(|&ok| ok)
    }
}
