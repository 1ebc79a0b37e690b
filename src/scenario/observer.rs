use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{Checkpoint, RunState};

/// Hooks invoked at state transitions and checkpoints.
///
/// A failing observer is logged and skipped; it never affects the run or the
/// other observers.
pub trait RunObserver: Send + Sync {
    /// # Errors
    ///
    /// An error is logged and otherwise ignored.
    fn on_transition(&self, _scenario: &str, _from: RunState, _to: RunState) -> Result<(), String> {
        Ok(())
    }

    /// # Errors
    ///
    /// An error is logged and otherwise ignored.
    fn on_checkpoint(&self, _checkpoint: &Checkpoint) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct Observers {
    entries: Vec<Arc<dyn RunObserver>>,
}

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn RunObserver>) {
        self.entries.push(observer);
    }

    pub(crate) fn transition(&self, scenario: &str, from: RunState, to: RunState) {
        debug!("Scenario '{}': {} -> {}", scenario, from, to);
        for (idx, observer) in self.entries.iter().enumerate() {
            if let Err(err) = observer.on_transition(scenario, from, to) {
                warn!(
                    "Observer {} failed on {} -> {} for '{}': {}",
                    idx, from, to, scenario, err
                );
            }
        }
    }

    pub(crate) fn checkpoint(&self, checkpoint: &Checkpoint) {
        let snapshot = &checkpoint.snapshot;
        info!(
            "Checkpoint '{}' #{}: {} requests, success {:.1}%, p95 {:.1}ms, {:.1} req/s (concurrency {})",
            checkpoint.scenario,
            checkpoint.iteration,
            snapshot.total_requests,
            snapshot.success_rate * 100.0,
            snapshot.latency.p95 * 1000.0,
            snapshot.throughput,
            checkpoint.concurrency
        );
        for (idx, observer) in self.entries.iter().enumerate() {
            if let Err(err) = observer.on_checkpoint(checkpoint) {
                warn!(
                    "Observer {} failed on checkpoint #{} for '{}': {}",
                    idx, checkpoint.iteration, checkpoint.scenario, err
                );
            }
        }
    }
}
