mod common;

use std::sync::Arc;

use cloudstorm_instruments::{ReportCollector, RunReport};
use cloudstorm_runner::prelude::{
    Args, BenchmarkEngine, HookResult, IterationContext, RunError, ScenarioDefinitionBuilder,
    ScenarioRegistry, TaskConfig, TaskFormat,
};
use cloudstorm_summary_model::load_summary_runs;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::Value;

use common::{assert_clean, cloud, runner};

#[derive(Debug, Default, Clone)]
struct CollectingReporter {
    runs: Arc<Mutex<Vec<RunReport>>>,
}

impl ReportCollector for CollectingReporter {
    fn add_run(&mut self, run: RunReport) {
        self.runs.lock().push(run);
    }

    fn finalize(&self) {}
}

fn succeed(_ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
    Ok(None)
}

fn fail_odd(ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
    anyhow::ensure!(ctx.iteration() % 2 == 0, "odd iteration");
    Ok(None)
}

fn registry() -> ScenarioRegistry {
    let mut registry = ScenarioRegistry::new();
    registry.register(
        ScenarioDefinitionBuilder::new("Fake")
            .use_method("succeed", succeed)
            .use_method("fail_odd", fail_odd),
    );
    registry
}

const TASK: &str = r#"
[[benchmark."Fake.succeed"]]
config = { times = 2 }

[[benchmark."Fake.succeed"]]
config = { times = 5, active_users = 5 }

[[benchmark."Fake.fail_odd"]]
config = { times = 4, active_users = 2, tenants = 2 }
"#;

#[test]
fn runs_every_configured_run_and_records_it() {
    let cloud = cloud();
    let reporter = CollectingReporter::default();
    let dir = tempfile::tempdir().unwrap();
    let summary_file = dir.path().join("summaries.jsonl");

    let mut engine = BenchmarkEngine::new(runner(registry(), &cloud))
        .with_reporter(Box::new(reporter.clone()))
        .with_summary_file(&summary_file);
    let task = TaskConfig::parse(TASK, TaskFormat::Toml).unwrap();

    let records = engine.benchmark(&task).unwrap();
    engine.finalize();

    let shape = records
        .iter()
        .map(|record| (record.name.as_str(), record.position, record.results.len()))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![
            ("Fake.fail_odd", 0, 4),
            ("Fake.succeed", 0, 2),
            ("Fake.succeed", 1, 5)
        ],
        shape
    );

    let runs = reporter.runs.lock().clone();
    assert_eq!(3, runs.len());
    assert_eq!(2, runs[0].stats.failures);
    assert_eq!(4, runs[0].stats.iterations);

    let summaries = load_summary_runs(&summary_file).unwrap();
    assert_eq!(3, summaries.len());
    assert_eq!(records[2].run_id, summaries[2].run_id);
    assert_eq!("continuous", summaries[2].execution_type);
    assert_eq!(5, summaries[2].iterations);
    assert_eq!(0, summaries[2].failures);
    // Same scenario, different options.
    assert_ne!(summaries[1].fingerprint(), summaries[2].fingerprint());

    assert_clean(&cloud);
}

#[test]
fn a_bad_run_late_in_the_task_stops_it_before_anything_runs() {
    let cloud = cloud();
    let before = cloud.inventory();
    let reporter = CollectingReporter::default();
    let mut engine = BenchmarkEngine::new(runner(registry(), &cloud))
        .with_reporter(Box::new(reporter.clone()));

    let task = TaskConfig::parse(
        r#"
        [[benchmark."Fake.succeed"]]
        config = { times = 1 }

        [[benchmark."Missing.method"]]
        config = { times = 1 }
        "#,
        TaskFormat::Toml,
    )
    .unwrap();

    let err = engine.benchmark(&task).unwrap_err();

    assert!(matches!(err, RunError::UnknownScenario { .. }));
    assert!(reporter.runs.lock().is_empty());
    assert_eq!(before, cloud.inventory());
}

#[test]
fn an_invalid_config_is_rejected_up_front() {
    let cloud = cloud();
    let mut engine = BenchmarkEngine::new(runner(registry(), &cloud));

    let task = TaskConfig::parse(
        r#"{"benchmark": {"Fake.succeed": [{"config": {"times": 0}}]}}"#,
        TaskFormat::Json,
    )
    .unwrap();

    let err = engine.benchmark(&task).unwrap_err();

    assert!(matches!(err, RunError::InvalidConfig(_)));
}
