use std::any::Any;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Keyword arguments forwarded to a scenario's `init` or to one of its methods.
pub type Args = serde_json::Map<String, serde_json::Value>;

/// All the iteration results of one run, in collection order.
pub type RunResult = Vec<IterationResult>;

/// Why an iteration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationError {
    /// The error type name, or one of the synthetic kinds produced by the runner.
    pub kind: String,
    pub message: String,
    /// The error chain, plus a backtrace when one was captured.
    pub trace: String,
}

impl IterationError {
    /// The iteration did not produce a result within the configured timeout.
    pub const TIMEOUT: &'static str = "Timeout";
    /// The scenario body panicked.
    pub const PANIC: &'static str = "Panic";
    /// The worker running the iteration went away without reporting a result.
    pub const WORKER_LOST: &'static str = "WorkerLost";

    pub fn new(kind: impl Into<String>, message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            Self::TIMEOUT,
            format!(
                "Iteration did not complete within {:.3}s",
                timeout.as_secs_f64()
            ),
            String::new(),
        )
    }

    pub fn panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Scenario panicked".to_string());

        Self::new(Self::PANIC, message, String::new())
    }

    pub fn worker_lost() -> Self {
        Self::new(
            Self::WORKER_LOST,
            "Worker exited without reporting a result",
            String::new(),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == Self::TIMEOUT
    }
}

/// The record of one attempted iteration.
///
/// `error` and `output` are never both set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// Wall clock time of the call minus `idle_time`, in seconds.
    pub elapsed_time: f64,
    /// Time the scenario declared as idle, for example while sleeping between actions, in seconds.
    pub idle_time: f64,
    pub error: Option<IterationError>,
    pub output: Option<serde_json::Value>,
}

impl IterationResult {
    pub fn success(elapsed: Duration, idle: Duration, output: Option<serde_json::Value>) -> Self {
        Self {
            elapsed_time: elapsed.saturating_sub(idle).as_secs_f64(),
            idle_time: idle.as_secs_f64(),
            error: None,
            output,
        }
    }

    pub fn failure(elapsed: Duration, idle: Duration, error: IterationError) -> Self {
        Self {
            elapsed_time: elapsed.saturating_sub(idle).as_secs_f64(),
            idle_time: idle.as_secs_f64(),
            error: Some(error),
            output: None,
        }
    }

    /// The synthetic result recorded for a slot whose worker did not answer in time.
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            elapsed_time: timeout.as_secs_f64(),
            idle_time: 0.0,
            error: Some(IterationError::timeout(timeout)),
            output: None,
        }
    }

    pub fn lost() -> Self {
        Self {
            elapsed_time: 0.0,
            idle_time: 0.0,
            error: Some(IterationError::worker_lost()),
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(IterationError::is_timeout)
    }
}
