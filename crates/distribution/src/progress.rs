//! Distribution progress utilities.

use diskfill_disk_space_allocation::{AllocationError, Strategy};

use crate::ChunkPlan;

/// Progress reporter.
pub trait Reporter {
    /// Report the start of the run over the given amount of targets.
    fn start(&self, total_targets: usize);

    /// Report the outcome of a single chunk.
    fn report(&self, plan: &ChunkPlan, outcome: &Result<Strategy, AllocationError>);
}

/// A reporter that does nothing.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn start(&self, _total_targets: usize) {}

    fn report(&self, _plan: &ChunkPlan, _outcome: &Result<Strategy, AllocationError>) {}
}

/// A reporter that emits [`tracing`] events for progress reporting.
#[derive(Debug)]
pub struct TracingReporter {
    /// The name of the progress reporter.
    pub name: std::borrow::Cow<'static, str>,
}

impl TracingReporter {
    /// Create a new [`TracingReporter`] with a static str name.
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: std::borrow::Cow::Borrowed(name),
        }
    }
}

impl Reporter for TracingReporter {
    fn start(&self, total_targets: usize) {
        tracing::info!(message = "Starting", %total_targets, reporter = %self.name);
    }

    fn report(&self, plan: &ChunkPlan, outcome: &Result<Strategy, AllocationError>) {
        let index = plan.index + 1;
        let path = plan.path.display();
        match outcome {
            Ok(strategy) => {
                tracing::info!(message = "Progress", %index, %path, size = %plan.size, %strategy, reporter = %self.name)
            }
            Err(_) => {
                tracing::debug!(message = "Progress", %index, %path, size = %plan.size, failed = true, reporter = %self.name)
            }
        }
    }
}
