use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cloudstorm_client::prelude::{ClientFactory, Credentials};
use cloudstorm_instruments::{aggregate_by_field, print_aggregate};

use crate::cli::CloudstormCli;
use crate::cloud::CloudConfig;
use crate::engine::{BenchmarkEngine, BenchmarkRecord, TaskConfig};
use crate::registry::ScenarioRegistry;
use crate::run::{RunnerSettings, ScenarioRunner};

/// Initialise the CLI and logging for the Cloudstorm runner.
pub fn init() -> CloudstormCli {
    env_logger::init();

    CloudstormCli::parse()
}

/// Do what the command line asks for with the scenarios in `registry`.
///
/// `connect` is given the administrator credentials from the cloud config and returns the client
/// factory to run against.
pub fn run_cli(
    cli: &CloudstormCli,
    registry: ScenarioRegistry,
    connect: impl FnOnce(&Credentials) -> anyhow::Result<Arc<dyn ClientFactory>>,
) -> anyhow::Result<()> {
    if cli.list {
        for name in registry.list() {
            println!("{name}");
        }
        return Ok(());
    }

    let task_path = cli.task.as_deref().context("No task file given")?;
    let cloud = match &cli.cloud_config {
        Some(path) => CloudConfig::load(path)?,
        None => CloudConfig::default(),
    };
    let task = TaskConfig::load(task_path)?;

    let admin = cloud.admin_credentials();
    let factory = connect(&admin)?;
    let runner = ScenarioRunner::new(Arc::new(registry), factory, &admin)?.with_settings(
        RunnerSettings {
            no_progress: cli.no_progress,
            ..Default::default()
        },
    );

    let mut engine = BenchmarkEngine::new(runner).with_reporter(cli.reporter.collector());
    if let Some(path) = &cli.summary_file {
        engine = engine.with_summary_file(path);
    }

    let records = engine.benchmark(&task)?;
    engine.finalize();

    if let Some(field) = &cli.aggregate_by {
        let reports = records
            .iter()
            .map(BenchmarkRecord::report)
            .collect::<Vec<_>>();
        print_aggregate(field, aggregate_by_field(&reports, field)?);
    }

    Ok(())
}
