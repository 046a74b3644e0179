use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run. Temporary identities created for the run carry
    /// this id in their names.
    pub run_id: String,
    /// The dotted `Class.method` name of the scenario that was run
    pub scenario_name: String,
    /// Index of this run among the runs configured for the same scenario in the task
    pub position: usize,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// Either `continuous` or `periodic`
    pub execution_type: String,
    /// The run options exactly as they were given in the task
    pub options: serde_json::Value,
    /// The number of iterations that produced a result
    pub iterations: usize,
    /// The number of iterations that failed, timeouts included
    pub failures: usize,
    /// The number of iterations that timed out
    pub timeouts: usize,
    /// Fastest successful iteration, in seconds
    pub min_time: Option<f64>,
    /// Mean of the successful iterations, in seconds
    pub avg_time: Option<f64>,
    /// Slowest successful iteration, in seconds
    pub max_time: Option<f64>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of.
    pub env: HashMap<String, String>,
    /// The version of Cloudstorm that was used for this run
    pub cloudstorm_version: String,
}

/// Counts and timings of a finished run, see [RunSummary::set_outcome].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub iterations: usize,
    pub failures: usize,
    pub timeouts: usize,
    pub min_time: Option<f64>,
    pub avg_time: Option<f64>,
    pub max_time: Option<f64>,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        position: usize,
        started_at: i64,
        execution_type: String,
        options: serde_json::Value,
        cloudstorm_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            position,
            started_at,
            execution_type,
            options,
            iterations: 0,
            failures: 0,
            timeouts: 0,
            min_time: None,
            avg_time: None,
            max_time: None,
            env: HashMap::with_capacity(0),
            cloudstorm_version,
        }
    }

    /// Record how the run went
    pub fn set_outcome(&mut self, outcome: RunOutcome) {
        self.iterations = outcome.iterations;
        self.failures = outcome.failures;
        self.timeouts = outcome.timeouts;
        self.min_time = outcome.min_time;
        self.avg_time = outcome.avg_time;
        self.max_time = outcome.max_time;
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify the configuration used to run the scenario, so
    /// that runs of the same configuration can be compared. It uses the
    ///     - Scenario name
    ///     - Execution type
    ///     - Run options, with object keys in sorted order
    ///     - Selected environment variables
    ///     - Cloudstorm version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.execution_type.as_bytes());
        hash_value(&mut hasher, &self.options);
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.cloudstorm_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

fn hash_value(hasher: &mut sha3::Sha3_256, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.iter()
                .sorted_by_key(|(k, _)| k.to_owned())
                .for_each(|(k, v)| {
                    Digest::update(hasher, k.as_bytes());
                    hash_value(hasher, v);
                });
        }
        serde_json::Value::Array(items) => items.iter().for_each(|v| hash_value(hasher, v)),
        other => Digest::update(hasher, other.to_string().as_bytes()),
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all("\n".as_bytes())?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
