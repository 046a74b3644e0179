use std::sync::Arc;

use anyhow::Context;
use cloudstorm_client::prelude::{ClientBundle, ClientFactory, Credentials};
use cloudstorm_core::prelude::{CancelHandle, RunResult};

use crate::clock::{Clock, SystemClock};
use crate::config::RunOptions;
use crate::context::InitContext;
use crate::error::RunError;
use crate::executor::Executor;
use crate::iteration::Dispatcher;
use crate::provision::TemporaryIdentities;
use crate::purge::PurgeSettings;
use crate::registry::ScenarioRegistry;
use crate::strategy::{dispatch, StrategyEnv};

const RUN_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// A fresh id for a run. Ids are safe to use in resource names.
pub fn new_run_id() -> String {
    nanoid::nanoid!(12, &RUN_ID_ALPHABET)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Do not show a progress bar while dispatching.
    pub no_progress: bool,
    pub purge: PurgeSettings,
}

/// Runs scenarios from a registry against a control plane.
///
/// Each run gets its own temporary identities, which are torn down before the run returns
/// whatever the outcome.
pub struct ScenarioRunner {
    registry: Arc<ScenarioRegistry>,
    factory: Arc<dyn ClientFactory>,
    admin: ClientBundle,
    runtime: tokio::runtime::Runtime,
    clock: Arc<dyn Clock>,
    settings: RunnerSettings,
}

impl ScenarioRunner {
    /// Connect as the administrator described by `admin_credentials`.
    pub fn new(
        registry: Arc<ScenarioRegistry>,
        factory: Arc<dyn ClientFactory>,
        admin_credentials: &Credentials,
    ) -> Result<Self, RunError> {
        let admin = factory
            .build(admin_credentials)
            .context("Could not connect with the administrative credentials")
            .map_err(RunError::Provisioning)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("cloudstorm-async")
            .build()
            .context("Failed to create Tokio runtime")
            .map_err(RunError::Provisioning)?;

        Ok(Self {
            registry,
            factory,
            admin,
            runtime,
            clock: Arc::new(SystemClock),
            settings: RunnerSettings::default(),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Run the scenario `name`, a `Class.method` string, with a fresh run id.
    pub fn run(&self, name: &str, options: &RunOptions) -> Result<RunResult, RunError> {
        self.run_with_id(&new_run_id(), name, options)
    }

    /// Run the scenario `name` under a run id chosen by the caller.
    ///
    /// Only configuration and provisioning problems are returned as errors. Failures inside the
    /// scenario are recorded in the results, one per iteration.
    ///
    /// Must not be called from inside an async context.
    pub fn run_with_id(
        &self,
        run_id: &str,
        name: &str,
        options: &RunOptions,
    ) -> Result<RunResult, RunError> {
        let scenario = self.registry.resolve(name)?;
        let plan = options.validate()?;
        scenario.validate_args(&options.args)?;

        log::info!("Starting run {run_id} of {name}");

        let executor = Executor::new(self.runtime.handle().clone(), CancelHandle::new());
        let mut identities = TemporaryIdentities::provision(
            self.admin.clone(),
            self.factory.as_ref(),
            run_id,
            &plan,
            executor.clone(),
            self.settings.purge,
        )?;

        let mut init_ctx = InitContext::new(&self.admin, &executor, identities.name_prefix());
        let context = match scenario.definition.init(&mut init_ctx, &options.init_args) {
            Ok(context) => context,
            Err(e) => {
                identities.release();
                return Err(RunError::Provisioning(e.context(format!(
                    "Init of {} failed",
                    scenario.definition.class_name
                ))));
            }
        };
        if let Some(cleanup) = scenario.definition.cleanup_fn {
            identities.set_cleanup(cleanup, context.clone());
        }

        let dispatcher = Dispatcher::new(
            &scenario,
            options.args.clone(),
            context,
            identities.bundles().to_vec(),
            self.admin.clone(),
            identities.name_prefix().to_string(),
        );
        let env = StrategyEnv {
            dispatcher: &dispatcher,
            runtime: self.runtime.handle().clone(),
            clock: self.clock.as_ref(),
            timeout: plan.timeout,
            show_progress: !self.settings.no_progress,
        };

        let outcome = dispatch(&plan, &env);
        identities.release();

        let results = outcome.map_err(RunError::Dispatch)?;
        log::info!(
            "Run {run_id} of {name} finished with {} result(s), {} failed",
            results.len(),
            results.iter().filter(|result| !result.is_success()).count()
        );
        Ok(results)
    }
}
