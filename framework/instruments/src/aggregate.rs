use std::collections::BTreeMap;

use itertools::Itertools;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::format::float2_or_dash;
use crate::report::RunReport;

#[derive(derive_more::Error, derive_more::Display, Debug, PartialEq, Eq)]
#[display("Run {run_id} of `{scenario}` has no config field `{field}`")]
pub struct NoSuchConfigField {
    pub field: String,
    pub scenario: String,
    pub run_id: String,
}

/// Timing figures of every run that used the same value for the aggregated field.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct AggregateRow {
    pub scenario: String,
    pub value: f64,
    pub runs: usize,
    #[tabled(display = "float2_or_dash")]
    pub min_time_s: Option<f64>,
    #[tabled(display = "float2_or_dash")]
    pub avg_time_s: Option<f64>,
    #[tabled(display = "float2_or_dash")]
    pub max_time_s: Option<f64>,
}

/// Group runs by scenario and by the value of `config.<field>` in their options.
///
/// Useful for seeing how timings move as, say, `active_users` grows. Rows are sorted by scenario
/// and then by value.
pub fn aggregate_by_field(
    runs: &[RunReport],
    field: &str,
) -> Result<Vec<AggregateRow>, NoSuchConfigField> {
    let mut groups: BTreeMap<String, Vec<(f64, &RunReport)>> = BTreeMap::new();
    for run in runs {
        let value = run
            .options
            .get("config")
            .and_then(|config| config.get(field))
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| NoSuchConfigField {
                field: field.to_string(),
                scenario: run.scenario.clone(),
                run_id: run.run_id.clone(),
            })?;

        groups
            .entry(run.scenario.clone())
            .or_default()
            .push((value, run));
    }

    let mut rows = Vec::new();
    for (scenario, runs) in groups {
        let by_value = runs
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.total_cmp(b))
            .chunk_by(|(value, _)| *value);

        for (value, group) in &by_value {
            let group = group.map(|(_, run)| run).collect::<Vec<_>>();
            let successes = group.iter().map(|run| run.stats.successes()).sum::<usize>();
            let total_time = group.iter().map(|run| run.stats.total_time).sum::<f64>();

            rows.push(AggregateRow {
                scenario: scenario.clone(),
                value,
                runs: group.len(),
                min_time_s: group
                    .iter()
                    .filter_map(|run| run.stats.min_time)
                    .min_by(f64::total_cmp),
                avg_time_s: (successes > 0).then(|| total_time / successes as f64),
                max_time_s: group
                    .iter()
                    .filter_map(|run| run.stats.max_time)
                    .max_by(f64::total_cmp),
            });
        }
    }

    Ok(rows)
}

pub fn print_aggregate(field: &str, rows: Vec<AggregateRow>) {
    println!("\nTimings aggregated by {field}");
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}
