mod runs_table;

use crate::report::{ReportCollector, RunReport};
use crate::report::in_memory_reporter::runs_table::RunRow;
use tabled::Table;
use tabled::settings::Style;

/// Keeps every run report in memory and prints a summary table of them when finalized.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    runs: Vec<RunReport>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn runs(&self) -> &[RunReport] {
        &self.runs
    }

    pub(crate) fn print_summary_of_runs(&self) {
        if self.runs.is_empty() {
            log::info!("No benchmark runs to summarise");
            return;
        }

        println!("\nSummary of runs");
        let rows = self.runs.iter().map(RunRow::from).collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_run(&mut self, run: RunReport) {
        self.runs.push(run);
    }

    fn finalize(&self) {
        self.print_summary_of_runs();
    }
}
