mod in_memory_reporter;

use crate::stats::RunStats;

pub use in_memory_reporter::InMemoryReporter;

/// What a reporter learns about one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub scenario: String,
    /// Index of the run among the runs configured for the same scenario.
    pub position: usize,
    pub run_id: String,
    /// The options the run was started with, as given in the task.
    pub options: serde_json::Value,
    pub stats: RunStats,
}

pub trait ReportCollector: Send {
    fn add_run(&mut self, run: RunReport);

    fn finalize(&self);
}

/// Discards everything. For runs where the caller consumes the results directly.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ReportCollector for NoopReporter {
    fn add_run(&mut self, _run: RunReport) {}

    fn finalize(&self) {}
}
