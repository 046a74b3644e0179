use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use cloudstorm_instruments::{InMemoryReporter, NoopReporter, ReportCollector};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct CloudstormCli {
    /// The task file to run, in TOML, JSON or YAML.
    ///
    /// The file holds a `benchmark` table that maps each `Class.method` scenario name to a list
    /// of runs. Each run has `args`, `init`, `execution` and `config` sections.
    #[clap(long, required_unless_present = "list")]
    pub task: Option<PathBuf>,

    /// A TOML file describing the cloud to benchmark.
    ///
    /// The `[identity]` section sets `uri`, `admin_username`, `admin_password` and
    /// `admin_tenant_name`. Anything not given uses the defaults for a local test cloud.
    #[clap(long)]
    pub cloud_config: Option<PathBuf>,

    /// The reporter to use.
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Append a JSON summary of every run to this file, one line per run.
    #[clap(long)]
    pub summary_file: Option<PathBuf>,

    /// After the task, print timings grouped by the value of this `config` field.
    ///
    /// For example `--aggregate-by active_users`. Every run in the task must set the field.
    #[clap(long)]
    pub aggregate_by: Option<String>,

    /// Do not show a progress bar.
    ///
    /// Useful when the output goes to a log file rather than a terminal.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Print the scenarios that can be run and exit.
    #[clap(long, default_value = "false")]
    pub list: bool,
}

/// The supported reporters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep run statistics in memory and print a table of them at the end.
    #[default]
    InMemory,
    /// Don't report anything.
    Noop,
}

impl ReporterOpt {
    pub fn collector(self) -> Box<dyn ReportCollector> {
        match self {
            Self::InMemory => Box::new(InMemoryReporter::new()),
            Self::Noop => Box::new(NoopReporter),
        }
    }
}
