use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use cloudstorm_core::prelude::{IterationResult, RunResult};

use super::StrategyEnv;
use crate::executor::Executor;

/// How long workers left running by a timed out slot get to notice the cancellation.
const STRAGGLER_GRACE: Duration = Duration::from_millis(200);

/// Run exactly `times` iterations on `active_users` workers.
///
/// Each iteration reports on its own channel. Slots are collected in order and the wait for each
/// slot is bounded by the timeout, so a stuck iteration costs at most one timeout and never holds
/// up the slots behind it. A result that arrives after its slot timed out is discarded, and once
/// every slot is collected the pool is cancelled rather than waited on.
pub(super) fn run(
    env: &StrategyEnv<'_>,
    times: usize,
    active_users: usize,
) -> anyhow::Result<RunResult> {
    let pool = env.pool(active_users)?;
    let progress = env.count_progress(times);

    let mut slots = Vec::with_capacity(times);
    for iteration in 0..times {
        let (sender, receiver) = mpsc::sync_channel(1);
        let dispatcher = env.dispatcher.clone();
        pool.submit(Box::new(move |executor: &Executor| {
            let _ = sender.send(dispatcher.run_iteration(iteration, executor));
        }))?;
        slots.push(receiver);
    }

    let mut results = Vec::with_capacity(times);
    let mut timed_out = 0;
    for (iteration, slot) in slots.into_iter().enumerate() {
        let result = match slot.recv_timeout(env.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Iteration {iteration} of {} did not finish within {:?}",
                    env.dispatcher.scenario(),
                    env.timeout
                );
                timed_out += 1;
                IterationResult::timed_out(env.timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!(
                    "Iteration {iteration} of {} was lost by its worker",
                    env.dispatcher.scenario()
                );
                IterationResult::lost()
            }
        };
        progress.iteration_done();
        results.push(result);
    }

    if timed_out > 0 {
        log::debug!(
            "{timed_out} iteration(s) of {} timed out, cancelling the pool",
            env.dispatcher.scenario()
        );
        pool.cancel_and_join(env.timeout.min(STRAGGLER_GRACE));
    } else {
        pool.close_and_join(env.timeout);
    }
    Ok(results)
}
