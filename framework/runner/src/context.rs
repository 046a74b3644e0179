use std::time::{Duration, Instant};

use cloudstorm_client::prelude::ClientBundle;
use rand::Rng;

use crate::executor::Executor;

/// The arguments a scenario passed to a runner helper make no sense.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Invalid arguments: {message}")]
pub struct InvalidArgumentsError {
    message: String,
}

impl InvalidArgumentsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build a resource name that the run's cleanup will recognise as belonging to the run.
pub(crate) fn random_name(prefix: &str, len: usize) -> String {
    let mut rng = rand::thread_rng();
    let suffix = (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect::<String>();
    format!("{prefix}{suffix}")
}

/// Passed to the scenario's `init` and `cleanup` hooks.
///
/// Both run once per run with administrative clients.
pub struct InitContext<'a> {
    admin: &'a ClientBundle,
    executor: &'a Executor,
    name_prefix: &'a str,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(admin: &'a ClientBundle, executor: &'a Executor, name_prefix: &'a str) -> Self {
        Self {
            admin,
            executor,
            name_prefix,
        }
    }

    pub fn admin_clients(&self) -> &ClientBundle {
        self.admin
    }

    pub fn executor(&self) -> &Executor {
        self.executor
    }

    pub fn random_name(&self, len: usize) -> String {
        random_name(self.name_prefix, len)
    }
}

/// Passed to every call of a scenario method.
///
/// A fresh context is built for each iteration, so nothing set on it leaks into another iteration.
pub struct IterationContext<'a> {
    iteration: usize,
    clients: &'a ClientBundle,
    admin: &'a ClientBundle,
    context: &'a serde_json::Value,
    executor: &'a Executor,
    name_prefix: &'a str,
    idle_time: Duration,
}

impl<'a> IterationContext<'a> {
    pub(crate) fn new(
        iteration: usize,
        clients: &'a ClientBundle,
        admin: &'a ClientBundle,
        context: &'a serde_json::Value,
        executor: &'a Executor,
        name_prefix: &'a str,
    ) -> Self {
        Self {
            iteration,
            clients,
            admin,
            context,
            executor,
            name_prefix,
            idle_time: Duration::ZERO,
        }
    }

    /// Index of this iteration within the run.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Clients for the temporary identity picked for this iteration.
    pub fn clients(&self) -> &ClientBundle {
        self.clients
    }

    pub fn admin_clients(&self) -> &ClientBundle {
        self.admin
    }

    /// The value returned by the scenario's `init`.
    pub fn context(&self) -> &serde_json::Value {
        self.context
    }

    pub fn executor(&self) -> &Executor {
        self.executor
    }

    pub fn random_name(&self, len: usize) -> String {
        random_name(self.name_prefix, len)
    }

    /// Sleep for a random time between `min` and `max` seconds.
    ///
    /// The time slept is declared as idle and does not count towards the iteration's elapsed time.
    pub fn sleep_between(&mut self, min: f64, max: f64) -> anyhow::Result<()> {
        if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
            return Err(InvalidArgumentsError::new(format!(
                "sleep_between expects 0 <= min <= max, got min={min} max={max}"
            ))
            .into());
        }

        let seconds = if min == max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|e| InvalidArgumentsError::new(format!("sleep_between: {e}")))?;

        log::trace!("Iteration {} sleeping for {seconds:.3}s", self.iteration);
        let started = Instant::now();
        let result = self.executor.sleep(duration);
        self.idle_time += started.elapsed();
        result
    }

    pub(crate) fn idle_time(&self) -> Duration {
        self.idle_time
    }
}
