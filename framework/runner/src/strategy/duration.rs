use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use cloudstorm_core::prelude::{IterationResult, RunResult};

use super::StrategyEnv;
use crate::executor::Executor;

/// Keep `active_users` workers looping over the scenario until `duration` has passed.
///
/// Only the latest `active_users` results are kept. Once the deadline has passed the pool is
/// cancelled and iterations still in flight are dropped without a record. They get up to the
/// iteration timeout to return, so that teardown does not race with them.
pub(super) fn run(
    env: &StrategyEnv<'_>,
    duration: Duration,
    active_users: usize,
) -> anyhow::Result<RunResult> {
    let pool = env.pool(active_users)?;
    let _progress = env.timed_progress(duration);

    let (sender, receiver) = mpsc::sync_channel(active_users);
    let next_iteration = Arc::new(AtomicUsize::new(0));

    for _ in 0..active_users {
        let sender = sender.clone();
        let dispatcher = env.dispatcher.clone();
        let next_iteration = next_iteration.clone();
        pool.submit(Box::new(move |executor: &Executor| {
            while !executor.is_cancelled() {
                let iteration = next_iteration.fetch_add(1, Ordering::Relaxed);
                let result = dispatcher.run_iteration(iteration, executor);
                if executor.is_cancelled() || sender.send(result).is_err() {
                    break;
                }
            }
        }))?;
    }
    drop(sender);

    let start = env.clock.now();
    let mut window = VecDeque::with_capacity(active_users);
    loop {
        let result = match receiver.recv_timeout(env.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "No iteration of {} finished within {:?}",
                    env.dispatcher.scenario(),
                    env.timeout
                );
                IterationResult::timed_out(env.timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Every worker of {} has exited", env.dispatcher.scenario());
                break;
            }
        };

        if window.len() == active_users {
            window.pop_front();
        }
        window.push_back(result);

        if env.clock.now().duration_since(start) > duration {
            break;
        }
    }

    log::debug!(
        "Deadline of {:?} reached for {}, {} iteration(s) started",
        duration,
        env.dispatcher.scenario(),
        next_iteration.load(Ordering::Relaxed)
    );
    // Workers blocked on a full channel see the disconnect and stop.
    drop(receiver);
    pool.cancel_and_join(env.timeout);

    Ok(window.into())
}
