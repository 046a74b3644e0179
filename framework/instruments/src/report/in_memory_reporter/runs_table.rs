use tabled::Tabled;

use crate::format::{float2, float2_or_dash};
use crate::report::RunReport;

#[derive(Tabled)]
pub struct RunRow {
    pub scenario: String,
    #[tabled(rename = "#")]
    pub position: usize,
    pub iterations: usize,
    pub failures: usize,
    pub timeouts: usize,
    #[tabled(display = "float2_or_dash")]
    pub min_time_s: Option<f64>,
    #[tabled(display = "float2_or_dash")]
    pub avg_time_s: Option<f64>,
    #[tabled(display = "float2_or_dash")]
    pub max_time_s: Option<f64>,
    #[tabled(display = "float2")]
    pub idle_time_s: f64,
}

impl From<&RunReport> for RunRow {
    fn from(run: &RunReport) -> Self {
        Self {
            scenario: run.scenario.clone(),
            position: run.position,
            iterations: run.stats.iterations,
            failures: run.stats.failures,
            timeouts: run.stats.timeouts,
            min_time_s: run.stats.min_time,
            avg_time_s: run.stats.avg_time,
            max_time_s: run.stats.max_time,
            idle_time_s: run.stats.idle_time,
        }
    }
}
