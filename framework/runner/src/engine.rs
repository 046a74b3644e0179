use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use cloudstorm_core::prelude::RunResult;
use cloudstorm_instruments::{NoopReporter, ReportCollector, RunReport, RunStats};
use cloudstorm_summary_model::{append_run_summary, RunOutcome, RunSummary};
use serde::{Deserialize, Serialize};

use crate::config::RunOptions;
use crate::error::RunError;
use crate::run::{new_run_id, ScenarioRunner};

/// Environment variables recorded in run summaries.
const RECORDED_ENV: [&str; 1] = ["RUST_LOG"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFormat {
    Toml,
    Json,
    Yaml,
}

impl TaskFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A task file: the runs to perform for each scenario, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub benchmark: BTreeMap<String, Vec<RunOptions>>,
}

impl TaskConfig {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let format = TaskFormat::from_path(path).ok_or_else(|| {
            RunError::invalid(format!(
                "Task file `{}` must end in .toml, .json, .yaml or .yml",
                path.display()
            ))
        })?;
        let content = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: TaskFormat) -> Result<Self, RunError> {
        let parsed = match format {
            TaskFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            TaskFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            TaskFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(RunError::InvalidConfig)
    }
}

/// The outcome of one run of a task.
#[derive(Debug, Clone)]
pub struct BenchmarkRecord {
    pub name: String,
    /// Index of the run among the runs of the same scenario.
    pub position: usize,
    pub options: RunOptions,
    pub run_id: String,
    /// Unix timestamp in seconds.
    pub started_at: i64,
    pub results: RunResult,
}

impl BenchmarkRecord {
    pub fn report(&self) -> RunReport {
        RunReport {
            scenario: self.name.clone(),
            position: self.position,
            run_id: self.run_id.clone(),
            options: self.options.to_value(),
            stats: RunStats::from_results(&self.results),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let stats = RunStats::from_results(&self.results);
        let mut summary = RunSummary::new(
            self.run_id.clone(),
            self.name.clone(),
            self.position,
            self.started_at,
            self.options.execution_type.as_str().to_string(),
            self.options.to_value(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        summary.set_outcome(RunOutcome {
            iterations: stats.iterations,
            failures: stats.failures,
            timeouts: stats.timeouts,
            min_time: stats.min_time,
            avg_time: stats.avg_time,
            max_time: stats.max_time,
        });
        for key in RECORDED_ENV {
            if let Ok(value) = std::env::var(key) {
                summary.add_env(key.to_string(), value);
            }
        }
        summary
    }
}

/// Runs every scenario of a task and reports on them.
pub struct BenchmarkEngine {
    runner: ScenarioRunner,
    reporter: Box<dyn ReportCollector>,
    summary_file: Option<PathBuf>,
}

impl BenchmarkEngine {
    pub fn new(runner: ScenarioRunner) -> Self {
        Self {
            runner,
            reporter: Box::new(NoopReporter),
            summary_file: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ReportCollector>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Append a [RunSummary] line to `path` after every run.
    pub fn with_summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(path.into());
        self
    }

    /// Check the whole task, then run it.
    ///
    /// Every scenario name and option set is checked before the first run starts, so a mistake
    /// late in the task does not waste the runs before it.
    pub fn benchmark(&mut self, task: &TaskConfig) -> Result<Vec<BenchmarkRecord>, RunError> {
        for (name, runs) in &task.benchmark {
            for options in runs {
                self.runner.registry().check(name, &options.args)?;
                options.validate()?;
            }
        }

        let mut records = Vec::new();
        for (name, runs) in &task.benchmark {
            for (position, options) in runs.iter().enumerate() {
                let run_id = new_run_id();
                let started_at = chrono::Utc::now().timestamp();
                log::info!("Running {name} [{position}] as run {run_id}");

                let results = self.runner.run_with_id(&run_id, name, options)?;
                let record = BenchmarkRecord {
                    name: name.clone(),
                    position,
                    options: options.clone(),
                    run_id,
                    started_at,
                    results,
                };

                if let Some(path) = &self.summary_file {
                    if let Err(e) = append_run_summary(&record.summary(), path) {
                        log::error!("Unable to write run summary to {}: {e:?}", path.display());
                    }
                }
                self.reporter.add_run(record.report());
                records.push(record);
            }
        }

        Ok(records)
    }

    pub fn finalize(&self) {
        self.reporter.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionType;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_follow_the_extension() {
        assert_eq!(Some(TaskFormat::Toml), TaskFormat::from_path(Path::new("a.toml")));
        assert_eq!(Some(TaskFormat::Yaml), TaskFormat::from_path(Path::new("a.yml")));
        assert_eq!(None, TaskFormat::from_path(Path::new("a.txt")));
    }

    #[test]
    fn the_same_task_in_every_format() {
        let toml = r#"
            [[benchmark."NovaServers.boot_and_delete_server"]]
            args = { image_name = "cirros", flavor_id = "m1.tiny" }
            execution = "continuous"
            config = { times = 10, active_users = 2 }

            [[benchmark."NovaServers.boot_server"]]
            execution = "periodic"
            config = { times = 3, period = 1.5 }
        "#;
        let json = r#"{
            "benchmark": {
                "NovaServers.boot_and_delete_server": [{
                    "args": {"image_name": "cirros", "flavor_id": "m1.tiny"},
                    "execution": "continuous",
                    "config": {"times": 10, "active_users": 2}
                }],
                "NovaServers.boot_server": [{
                    "execution": "periodic",
                    "config": {"times": 3, "period": 1.5}
                }]
            }
        }"#;
        let yaml = r#"
benchmark:
  NovaServers.boot_and_delete_server:
    - args: {image_name: cirros, flavor_id: m1.tiny}
      execution: continuous
      config: {times: 10, active_users: 2}
  NovaServers.boot_server:
    - execution: periodic
      config: {times: 3, period: 1.5}
"#;

        let from_toml = TaskConfig::parse(toml, TaskFormat::Toml).unwrap();
        let from_json = TaskConfig::parse(json, TaskFormat::Json).unwrap();
        let from_yaml = TaskConfig::parse(yaml, TaskFormat::Yaml).unwrap();

        assert_eq!(from_json, from_toml);
        assert_eq!(from_json, from_yaml);

        let periodic = &from_json.benchmark["NovaServers.boot_server"][0];
        assert_eq!(ExecutionType::Periodic, periodic.execution_type);
        assert_eq!(Some(3), periodic.config.times);
    }

    #[test]
    fn unknown_fields_are_invalid() {
        let err = TaskConfig::parse(r#"{"benchmark": {}, "extra": 1}"#, TaskFormat::Json)
            .unwrap_err();

        assert!(matches!(err, RunError::InvalidConfig(_)));
    }

    #[test]
    fn a_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = TaskConfig::load(&dir.path().join("task.toml")).unwrap_err();

        assert!(matches!(err, RunError::Io { .. }));
    }
}
