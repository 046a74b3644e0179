mod cli;
mod clock;
mod cloud;
mod config;
mod context;
mod definition;
mod engine;
mod error;
mod executor;
mod init;
mod iteration;
mod pool;
mod progress;
mod provision;
mod purge;
mod registry;
mod run;
mod strategy;
mod types;

pub mod prelude {
    pub use crate::cli::{CloudstormCli, ReporterOpt};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::cloud::{CloudConfig, IdentityConfig};
    pub use crate::config::{
        Dispatch, ExecutionType, RunConfig, RunOptions, RunPlan, DEFAULT_TIMEOUT_S,
        MAX_ACTIVE_USERS, MAX_IDENTITIES, MAX_SECONDS, MAX_TIMES,
    };
    pub use crate::context::{InitContext, InvalidArgumentsError, IterationContext};
    pub use crate::definition::{
        ArgsValidator, CleanupHook, HookResult, InitHook, MethodHook, ScenarioDefinitionBuilder,
    };
    pub use crate::engine::{BenchmarkEngine, BenchmarkRecord, TaskConfig, TaskFormat};
    pub use crate::error::RunError;
    pub use crate::executor::Executor;
    pub use crate::init::{init, run_cli};
    pub use crate::purge::PurgeSettings;
    pub use crate::registry::{ScenarioRegistry, ScenarioSpec};
    pub use crate::run::{new_run_id, RunnerSettings, ScenarioRunner};
    pub use crate::types::CloudstormResult;

    pub use cloudstorm_core::prelude::{
        Args, CancelledError, IterationError, IterationResult, RunResult, TaggedError,
    };
}
