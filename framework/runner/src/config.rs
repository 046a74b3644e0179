use std::time::Duration;

use cloudstorm_core::prelude::Args;
use serde::{Deserialize, Serialize};

use crate::error::RunError;

pub const DEFAULT_TIMEOUT_S: f64 = 10000.0;

/// Upper bound for `timeout`, `duration` and `period`, in seconds. One year.
pub const MAX_SECONDS: f64 = 365.0 * 24.0 * 3600.0;
/// Upper bound for `times`.
pub const MAX_TIMES: usize = 1_000_000;
/// Upper bound for `active_users`, each of which is a thread.
pub const MAX_ACTIVE_USERS: usize = 10_000;
/// Upper bound for `tenants * users_per_tenant`.
pub const MAX_IDENTITIES: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Iterations run concurrently, either a fixed number of times or for a fixed duration.
    #[default]
    Continuous,
    /// Iterations run one after another with a pause between them.
    Periodic,
}

impl ExecutionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Periodic => "periodic",
        }
    }
}

/// The `config` section of a run. Every field is optional and checked by [RunOptions::validate].
///
/// Integers are read as signed values so that a negative count is reported as an invalid config
/// rather than as a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<i64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_users: Option<i64>,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenants: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_per_tenant: Option<i64>,
}

/// Everything needed to run a scenario once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    /// Forwarded to every call of the scenario method.
    #[serde(default)]
    pub args: Args,
    /// Forwarded to the scenario's `init`.
    #[serde(default, rename = "init")]
    pub init_args: Args,
    #[serde(default, alias = "execution")]
    pub execution_type: ExecutionType,
    #[serde(default)]
    pub config: RunConfig,
}

/// How iterations are dispatched, decided once the options have been validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    FixedCount { times: usize, active_users: usize },
    Duration { duration: Duration, active_users: usize },
    Periodic { times: usize, period: Duration },
}

/// Validated run options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPlan {
    pub dispatch: Dispatch,
    pub timeout: Duration,
    pub tenants: usize,
    pub users_per_tenant: usize,
}

impl RunPlan {
    pub fn identities(&self) -> usize {
        self.tenants * self.users_per_tenant
    }

    /// The number of iterations that may be in flight at once.
    pub fn concurrency(&self) -> usize {
        match self.dispatch {
            Dispatch::FixedCount { active_users, .. } | Dispatch::Duration { active_users, .. } => {
                active_users
            }
            Dispatch::Periodic { .. } => 1,
        }
    }
}

impl RunOptions {
    pub fn from_value(value: serde_json::Value) -> Result<Self, RunError> {
        serde_json::from_value(value).map_err(|e| RunError::invalid(e.to_string()))
    }

    /// The options as they would be written in a task file.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Check the options and work out how the run should be dispatched.
    ///
    /// This has no side effects, so it is safe to call before anything is provisioned.
    pub fn validate(&self) -> Result<RunPlan, RunError> {
        let config = &self.config;

        let timeout = seconds("timeout", config.timeout.unwrap_or(DEFAULT_TIMEOUT_S))?;
        if timeout.is_zero() {
            return Err(RunError::invalid("timeout must be greater than 0"));
        }
        let tenants = bounded("tenants", config.tenants, MAX_IDENTITIES)?;
        let users_per_tenant =
            bounded("users_per_tenant", config.users_per_tenant, MAX_IDENTITIES)?;
        if tenants.saturating_mul(users_per_tenant) > MAX_IDENTITIES {
            return Err(RunError::invalid(format!(
                "tenants * users_per_tenant must be at most {MAX_IDENTITIES}, \
                 got {tenants} * {users_per_tenant}"
            )));
        }

        let dispatch = match self.execution_type {
            ExecutionType::Continuous => {
                if config.period.is_some() {
                    return Err(RunError::invalid(
                        "period can only be used with the periodic execution type",
                    ));
                }
                let active_users =
                    bounded("active_users", config.active_users, MAX_ACTIVE_USERS)?;

                match (config.times, config.duration) {
                    (Some(_), Some(_)) => {
                        return Err(RunError::invalid(
                            "times and duration cannot be used together",
                        ))
                    }
                    (_, Some(duration)) => Dispatch::Duration {
                        duration: seconds("duration", duration)?,
                        active_users,
                    },
                    (times, None) => Dispatch::FixedCount {
                        times: bounded("times", times, MAX_TIMES)?,
                        active_users,
                    },
                }
            }
            ExecutionType::Periodic => {
                if config.duration.is_some() {
                    return Err(RunError::invalid(
                        "duration cannot be used with the periodic execution type",
                    ));
                }
                if config.active_users.is_some() {
                    return Err(RunError::invalid(
                        "active_users cannot be used with the periodic execution type",
                    ));
                }
                let (Some(times), Some(period)) = (config.times, config.period) else {
                    return Err(RunError::invalid(
                        "the periodic execution type requires both times and period",
                    ));
                };

                Dispatch::Periodic {
                    times: bounded("times", Some(times), MAX_TIMES)?,
                    period: seconds("period", period * 60.0)?,
                }
            }
        };

        Ok(RunPlan {
            dispatch,
            timeout,
            tenants,
            users_per_tenant,
        })
    }
}

fn bounded(name: &str, value: Option<i64>, max: usize) -> Result<usize, RunError> {
    let value = value.unwrap_or(1);
    if value < 1 {
        return Err(RunError::invalid(format!(
            "{name} must be at least 1, got {value}"
        )));
    }
    match usize::try_from(value) {
        Ok(value) if value <= max => Ok(value),
        _ => Err(RunError::invalid(format!(
            "{name} must be at most {max}, got {value}"
        ))),
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, RunError> {
    if !value.is_finite() || value < 0.0 {
        return Err(RunError::invalid(format!(
            "{name} must be a finite number that is not negative, got {value}"
        )));
    }
    if value > MAX_SECONDS {
        return Err(RunError::invalid(format!(
            "{name} must be at most {MAX_SECONDS} seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| RunError::invalid(format!("{name}: {e}")))
}
