use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use cloudstorm_core::prelude::{IterationResult, RunResult};

use super::StrategyEnv;
use crate::executor::Executor;

/// Run `times` iterations one after another, pausing for `period` between them.
///
/// Every iteration gets a fresh single worker so that one which times out is cancelled and left
/// behind without delaying the schedule. There is no pause after the last iteration.
pub(super) fn run(
    env: &StrategyEnv<'_>,
    times: usize,
    period: Duration,
) -> anyhow::Result<RunResult> {
    let planned = period.saturating_mul(u32::try_from(times.saturating_sub(1)).unwrap_or(u32::MAX));
    let _progress = env.timed_progress(planned);

    let mut results = Vec::with_capacity(times);
    for iteration in 0..times {
        let pool = env.pool(1)?;
        let (sender, receiver) = mpsc::sync_channel(1);
        let dispatcher = env.dispatcher.clone();
        pool.submit(Box::new(move |executor: &Executor| {
            let _ = sender.send(dispatcher.run_iteration(iteration, executor));
        }))?;

        match receiver.recv_timeout(env.timeout) {
            Ok(result) => {
                results.push(result);
                pool.close_and_join(env.timeout);
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Iteration {iteration} of {} did not finish within {:?}",
                    env.dispatcher.scenario(),
                    env.timeout
                );
                results.push(IterationResult::timed_out(env.timeout));
                pool.terminate();
            }
            Err(RecvTimeoutError::Disconnected) => {
                results.push(IterationResult::lost());
                pool.terminate();
            }
        }

        if iteration + 1 < times {
            log::debug!("Waiting {period:?} before the next iteration");
            env.clock.sleep(period);
        }
    }

    Ok(results)
}
