use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cloudstorm_client::prelude::{
    status, wait_for, wait_for_deletion, BootRequest, ComputeApi, ImageApi, Resource,
    ResourceKind, ServerAction, WaitOptions,
};
use cloudstorm_runner::prelude::{Args, Executor, InvalidArgumentsError, IterationContext};
use serde_json::Value;

const DEFAULT_POLL_DELAY_S: f64 = 2.0;
const DEFAULT_WAIT_TIMEOUT_S: f64 = 600.0;
const DEFAULT_CHECK_INTERVAL_S: f64 = 3.0;

/// How the server helpers wait for the control plane.
///
/// `poll_delay` is slept once after a request, before the first status check, to save API calls on
/// transitions that are known to take a while.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerWaits {
    pub poll_delay: Duration,
    pub wait: WaitOptions,
}

impl Default for ServerWaits {
    fn default() -> Self {
        Self {
            poll_delay: Duration::from_secs_f64(DEFAULT_POLL_DELAY_S),
            wait: WaitOptions::new(
                Duration::from_secs_f64(DEFAULT_WAIT_TIMEOUT_S),
                Duration::from_secs_f64(DEFAULT_CHECK_INTERVAL_S),
            ),
        }
    }
}

impl ServerWaits {
    /// Read `poll_delay`, `wait_timeout` and `check_interval`, in seconds, from the workload args.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            poll_delay: seconds_arg(args, "poll_delay")?.unwrap_or(defaults.poll_delay),
            wait: WaitOptions::new(
                seconds_arg(args, "wait_timeout")?.unwrap_or(defaults.wait.timeout),
                seconds_arg(args, "check_interval")?.unwrap_or(defaults.wait.check_interval),
            ),
        })
    }
}

fn seconds_arg(args: &Args, name: &str) -> anyhow::Result<Option<Duration>> {
    let Some(value) = args.get(name) else {
        return Ok(None);
    };
    let seconds = value
        .as_f64()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| {
            InvalidArgumentsError::new(format!(
                "{name} must be a number of seconds that is not negative, got {value}"
            ))
        })?;
    Ok(Some(Duration::try_from_secs_f64(seconds)?))
}

pub(crate) fn string_arg<'a>(args: &'a Args, name: &str) -> anyhow::Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(InvalidArgumentsError::new(format!(
            "{name} must be a string, got {other}"
        ))
        .into()),
    }
}

pub(crate) fn f64_arg(args: &Args, name: &str, default: f64) -> anyhow::Result<f64> {
    match args.get(name) {
        None => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| {
            InvalidArgumentsError::new(format!("{name} must be a number, got {value}")).into()
        }),
    }
}

/// Every workload needs a flavor and either an image id or an image name.
pub(crate) fn validate_image_and_flavor(args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(
        string_arg(args, "flavor_id")?.is_some(),
        "flavor_id is required"
    );
    anyhow::ensure!(
        string_arg(args, "image_id")?.is_some() || string_arg(args, "image_name")?.is_some(),
        "one of image_id or image_name is required"
    );
    ServerWaits::from_args(args)?;
    Ok(())
}

/// Compute operations that wait for the control plane to settle before returning.
///
/// It holds its own handles to the clients, so the iteration context stays free for other uses.
pub struct Nova {
    compute: Arc<dyn ComputeApi>,
    image: Arc<dyn ImageApi>,
    executor: Executor,
    waits: ServerWaits,
}

impl Nova {
    pub fn new(ctx: &IterationContext<'_>, args: &Args) -> anyhow::Result<Self> {
        Ok(Self {
            compute: ctx.clients().compute.clone(),
            image: ctx.clients().image.clone(),
            executor: ctx.executor().clone(),
            waits: ServerWaits::from_args(args)?,
        })
    }

    pub fn compute(&self) -> &dyn ComputeApi {
        self.compute.as_ref()
    }

    /// The image to boot from, by `image_id` or else by `image_name`.
    pub fn resolve_image(&self, args: &Args) -> anyhow::Result<String> {
        if let Some(image_id) = string_arg(args, "image_id")? {
            return Ok(image_id.to_string());
        }
        let name = string_arg(args, "image_name")?
            .context("one of image_id or image_name is required")?;
        let image = self
            .image
            .find_by_name(name)
            .with_context(|| format!("No image named `{name}`"))?;
        Ok(image.id)
    }

    /// Boot a server and wait for it to become ACTIVE.
    pub fn boot(&self, request: &BootRequest) -> anyhow::Result<Resource> {
        let server = self.compute.boot_server(request)?;
        log::debug!("Booted server {} ({})", server.name, server.id);
        self.wait_for_server(server, status::ACTIVE)
    }

    pub fn reboot(&self, server: &Resource, soft: bool) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Reboot { soft }, status::ACTIVE)
    }

    pub fn stop(&self, server: &Resource) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Stop, status::SHUTOFF)
    }

    pub fn start(&self, server: &Resource) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Start, status::ACTIVE)
    }

    pub fn rescue(&self, server: &Resource) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Rescue, status::RESCUE)
    }

    pub fn unrescue(&self, server: &Resource) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Unrescue, status::ACTIVE)
    }

    pub fn suspend(&self, server: &Resource) -> anyhow::Result<Resource> {
        self.act(server, ServerAction::Suspend, status::SUSPENDED)
    }

    /// Delete a server and wait until it is gone.
    pub fn delete(&self, server: &Resource) -> anyhow::Result<()> {
        self.compute.delete(ResourceKind::Server, &server.id)?;
        wait_for_deletion(self.compute.as_ref(), ResourceKind::Server, &server.id, self.waits.wait)?;
        Ok(())
    }

    /// Snapshot a server into an image named after it and wait for the image to become ACTIVE.
    pub fn create_image(&self, server: &Resource) -> anyhow::Result<Resource> {
        let image_id = self.compute.create_server_image(&server.id, &server.name)?;
        let image = self.image.get(ResourceKind::Image, &image_id)?;
        let image = wait_for(
            image,
            |image| self.image.get(ResourceKind::Image, &image.id),
            |image| image.has_status(status::ACTIVE),
            self.waits.wait,
            &format!("image `{image_id}` to become {}", status::ACTIVE),
        )?;
        Ok(image)
    }

    /// Delete an image and wait for it to be marked deleted.
    pub fn delete_image(&self, image: &Resource) -> anyhow::Result<()> {
        self.image.delete(ResourceKind::Image, &image.id)?;
        wait_for_deletion(self.image.as_ref(), ResourceKind::Image, &image.id, self.waits.wait)?;
        Ok(())
    }

    fn act(
        &self,
        server: &Resource,
        action: ServerAction,
        target: &str,
    ) -> anyhow::Result<Resource> {
        log::trace!("Requesting {} of server {}", action.name(), server.id);
        self.compute.server_action(&server.id, action)?;
        self.wait_for_server(server.clone(), target)
            .with_context(|| format!("Server {} did not finish {}", server.id, action.name()))
    }

    fn wait_for_server(&self, server: Resource, target: &str) -> anyhow::Result<Resource> {
        if !self.waits.poll_delay.is_zero() {
            self.executor.sleep(self.waits.poll_delay)?;
        }

        let id = server.id.clone();
        let server = wait_for(
            server,
            |server| self.compute.get(ResourceKind::Server, &server.id),
            |server| server.has_status(target),
            self.waits.wait,
            &format!("server `{id}` to become {target}"),
        )?;
        Ok(server)
    }
}

/// Call `attempt` until it succeeds, at most `attempts` times, sleeping `delay` after each failure.
///
/// The last error is returned when every attempt failed. Sleeps stop early if the run is
/// cancelled.
pub fn retry_fixed<T>(
    executor: &Executor,
    attempts: usize,
    delay: Duration,
    mut attempt: impl FnMut(usize) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    anyhow::ensure!(attempts > 0, "retry_fixed needs at least one attempt");

    let mut n = 0;
    loop {
        match attempt(n) {
            Ok(value) => return Ok(value),
            Err(e) if n + 1 < attempts => {
                log::debug!("Attempt {} of {attempts} failed: {e:#}", n + 1);
                executor.sleep(delay)?;
                n += 1;
            }
            Err(e) => {
                return Err(e.context(format!("Giving up after {attempts} attempt(s)")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    #[test]
    fn waits_default_to_slow_polling() {
        let waits = ServerWaits::from_args(&Args::new()).unwrap();

        assert_eq!(ServerWaits::default(), waits);
        assert_eq!(Duration::from_secs(600), waits.wait.timeout);
    }

    #[test]
    fn waits_can_be_overridden() {
        let waits = ServerWaits::from_args(&args(
            json!({"poll_delay": 0, "wait_timeout": 1.5, "check_interval": 0.01}),
        ))
        .unwrap();

        assert_eq!(Duration::ZERO, waits.poll_delay);
        assert_eq!(Duration::from_millis(1500), waits.wait.timeout);
        assert_eq!(Duration::from_millis(10), waits.wait.check_interval);
    }

    #[test]
    fn negative_waits_are_invalid_arguments() {
        let err = ServerWaits::from_args(&args(json!({"poll_delay": -1}))).unwrap_err();

        assert!(err.downcast_ref::<InvalidArgumentsError>().is_some());
    }

    #[test]
    fn image_and_flavor_are_required() {
        assert!(validate_image_and_flavor(&args(json!({"image_id": "i", "flavor_id": "f"}))).is_ok());
        assert!(validate_image_and_flavor(&args(json!({"image_name": "cirros", "flavor_id": "f"}))).is_ok());
        assert!(validate_image_and_flavor(&args(json!({"image_id": "i"}))).is_err());
        assert!(validate_image_and_flavor(&args(json!({"flavor_id": "f"}))).is_err());
        assert!(validate_image_and_flavor(&args(json!({"image_id": 3, "flavor_id": "f"}))).is_err());
    }
}
