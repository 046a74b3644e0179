mod duration;
mod fixed_count;
mod periodic;

use std::time::Duration;

use cloudstorm_core::prelude::{CancelHandle, RunResult};

use crate::clock::Clock;
use crate::config::{Dispatch, RunPlan};
use crate::executor::Executor;
use crate::iteration::Dispatcher;
use crate::pool::WorkerPool;
use crate::progress::Progress;

/// What every strategy needs to dispatch iterations.
pub(crate) struct StrategyEnv<'a> {
    pub(crate) dispatcher: &'a Dispatcher,
    pub(crate) runtime: tokio::runtime::Handle,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) timeout: Duration,
    pub(crate) show_progress: bool,
}

impl StrategyEnv<'_> {
    /// A new pool with its own cancellation, so stopping it leaves other pools alone.
    fn pool(&self, size: usize) -> anyhow::Result<WorkerPool> {
        WorkerPool::new(
            size,
            Executor::new(self.runtime.clone(), CancelHandle::new()),
        )
    }

    fn count_progress(&self, total: usize) -> Progress {
        if self.show_progress {
            Progress::count(total)
        } else {
            Progress::hidden()
        }
    }

    fn timed_progress(&self, planned_runtime: Duration) -> Progress {
        if self.show_progress {
            Progress::timed(planned_runtime)
        } else {
            Progress::hidden()
        }
    }
}

/// Run the strategy that the plan calls for.
pub(crate) fn dispatch(plan: &RunPlan, env: &StrategyEnv<'_>) -> anyhow::Result<RunResult> {
    log::info!(
        "Dispatching {} with {:?}, timeout {:?}",
        env.dispatcher.scenario(),
        plan.dispatch,
        env.timeout
    );

    match plan.dispatch {
        Dispatch::FixedCount {
            times,
            active_users,
        } => fixed_count::run(env, times, active_users),
        Dispatch::Duration {
            duration,
            active_users,
        } => duration::run(env, duration, active_users),
        Dispatch::Periodic { times, period } => periodic::run(env, times, period),
    }
}
