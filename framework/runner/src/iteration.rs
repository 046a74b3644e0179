use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudstorm_client::prelude::ClientBundle;
use cloudstorm_core::prelude::{Args, ErrorClassifier, IterationError, IterationResult};
use rand::seq::SliceRandom;

use crate::context::IterationContext;
use crate::definition::MethodHook;
use crate::executor::Executor;
use crate::registry::ResolvedScenario;

/// Runs single iterations of a scenario method and turns whatever happens into a result.
///
/// Everything an iteration can see is fixed when the dispatcher is built and never changes while
/// iterations run. Clones share that state.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    inner: Arc<DispatchState>,
}

struct DispatchState {
    scenario: String,
    method: MethodHook,
    args: Args,
    context: serde_json::Value,
    clients: Vec<ClientBundle>,
    admin: ClientBundle,
    name_prefix: String,
    classifier: ErrorClassifier,
}

impl Dispatcher {
    pub(crate) fn new(
        scenario: &ResolvedScenario,
        args: Args,
        context: serde_json::Value,
        clients: Vec<ClientBundle>,
        admin: ClientBundle,
        name_prefix: String,
    ) -> Self {
        Self {
            inner: Arc::new(DispatchState {
                scenario: scenario.spec.to_string(),
                method: scenario.method.run,
                args,
                context,
                clients,
                admin,
                name_prefix,
                classifier: scenario.definition.classifier.clone(),
            }),
        }
    }

    pub(crate) fn scenario(&self) -> &str {
        &self.inner.scenario
    }

    /// Run iteration `iteration` with a randomly chosen identity.
    ///
    /// Never fails and never panics: errors and panics from the scenario become failed results.
    pub(crate) fn run_iteration(&self, iteration: usize, executor: &Executor) -> IterationResult {
        let state = &*self.inner;

        let Some(clients) = state.clients.choose(&mut rand::thread_rng()) else {
            return IterationResult::failure(
                Duration::ZERO,
                Duration::ZERO,
                IterationError::new(
                    ErrorClassifier::UNCLASSIFIED,
                    "No client bundles to run the iteration with",
                    String::new(),
                ),
            );
        };

        let mut ctx = IterationContext::new(
            iteration,
            clients,
            &state.admin,
            &state.context,
            executor,
            &state.name_prefix,
        );

        log::trace!(
            "Starting iteration {iteration} of {} as {}",
            state.scenario,
            clients.credentials.username
        );
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| (state.method)(&mut ctx, &state.args)));
        let elapsed = started.elapsed();
        let idle = ctx.idle_time();

        match outcome {
            Ok(Ok(output)) => {
                log::trace!("Iteration {iteration} of {} succeeded", state.scenario);
                IterationResult::success(elapsed, idle, output)
            }
            Ok(Err(e)) => {
                log::debug!("Iteration {iteration} of {} failed: {e:?}", state.scenario);
                IterationResult::failure(elapsed, idle, state.classifier.classify(&e))
            }
            Err(payload) => {
                let error = IterationError::panic(&*payload);
                log::warn!(
                    "Iteration {iteration} of {} panicked: {}",
                    state.scenario,
                    error.message
                );
                IterationResult::failure(elapsed, idle, error)
            }
        }
    }
}
