use cloudstorm_core::prelude::IterationResult;
use itertools::{Itertools, MinMaxResult};

/// Timing statistics for one run.
///
/// Only successful iterations contribute to the time figures. A run in which nothing succeeded has
/// no min, avg or max.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub iterations: usize,
    pub failures: usize,
    pub timeouts: usize,
    /// Sum of the declared idle time across all iterations, in seconds.
    pub idle_time: f64,
    /// Sum of `elapsed_time` across successful iterations, in seconds.
    pub total_time: f64,
    pub min_time: Option<f64>,
    pub avg_time: Option<f64>,
    pub max_time: Option<f64>,
}

impl RunStats {
    pub fn from_results(results: &[IterationResult]) -> Self {
        let times = results
            .iter()
            .filter(|result| result.is_success())
            .map(|result| result.elapsed_time)
            .collect::<Vec<_>>();

        let (min_time, max_time) = match times.iter().copied().minmax_by(f64::total_cmp) {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(t) => (Some(t), Some(t)),
            MinMaxResult::MinMax(min, max) => (Some(min), Some(max)),
        };
        let total_time = times.iter().sum::<f64>();

        Self {
            iterations: results.len(),
            failures: results.len() - times.len(),
            timeouts: results.iter().filter(|result| result.is_timeout()).count(),
            idle_time: results.iter().map(|result| result.idle_time).sum(),
            total_time,
            min_time,
            avg_time: (!times.is_empty()).then(|| total_time / times.len() as f64),
            max_time,
        }
    }

    pub fn successes(&self) -> usize {
        self.iterations - self.failures
    }
}
