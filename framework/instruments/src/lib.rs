mod aggregate;
mod format;
mod report;
mod stats;

pub use aggregate::{aggregate_by_field, print_aggregate, AggregateRow, NoSuchConfigField};
pub use report::{InMemoryReporter, NoopReporter, ReportCollector, RunReport};
pub use stats::RunStats;
