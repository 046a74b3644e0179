use std::time::{Duration, Instant};

use crate::api::ResourceApi;
use crate::error::{CloudError, CloudResult};
use crate::resource::{status, Resource, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub check_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            check_interval: Duration::from_secs(1),
        }
    }
}

impl WaitOptions {
    pub const fn new(timeout: Duration, check_interval: Duration) -> Self {
        Self {
            timeout,
            check_interval,
        }
    }
}

/// Poll until `is_ready` accepts the resource.
///
/// The resource is refreshed once before the first check so that a resource which is already in
/// the desired state returns without sleeping.
pub fn wait_for<T>(
    resource: T,
    mut update: impl FnMut(&T) -> CloudResult<T>,
    mut is_ready: impl FnMut(&T) -> bool,
    options: WaitOptions,
    waiting_for: &str,
) -> CloudResult<T> {
    let start = Instant::now();
    let mut resource = update(&resource)?;
    loop {
        if is_ready(&resource) {
            return Ok(resource);
        }

        if start.elapsed() > options.timeout {
            return Err(CloudError::Timeout {
                timeout: options.timeout,
                waiting_for: waiting_for.to_string(),
            });
        }

        std::thread::sleep(options.check_interval);
        resource = update(&resource)?;
    }
}

/// Wait until a resource is gone. Soft deleted resources count as gone.
pub fn wait_for_deletion<A: ResourceApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    id: &str,
    options: WaitOptions,
) -> CloudResult<()> {
    wait_for(
        false,
        |_| match api.get(kind, id) {
            Ok(resource) => Ok(resource.has_status(status::DELETED)),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        },
        |deleted| *deleted,
        options,
        &format!("{kind} `{id}` to be deleted"),
    )
    .map(|_| ())
}

/// Wait until the listed collection has one of the allowed sizes.
pub fn wait_for_list_size<A: ResourceApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    sizes: &[usize],
    options: WaitOptions,
) -> CloudResult<Vec<Resource>> {
    wait_for(
        Vec::new(),
        |_| api.list(kind),
        |resources| sizes.contains(&resources.len()),
        options,
        &format!("{kind} list to have size in {sizes:?}"),
    )
}

pub fn wait_for_empty_list<A: ResourceApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    options: WaitOptions,
) -> CloudResult<()> {
    wait_for_list_size(api, kind, &[0], options).map(|_| ())
}

/// Wait until every listed resource is in one of `statuses`.
pub fn wait_for_list_statuses<A: ResourceApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    statuses: &[&str],
    options: WaitOptions,
) -> CloudResult<Vec<Resource>> {
    wait_for(
        Vec::new(),
        |_| api.list(kind),
        |resources: &Vec<Resource>| {
            resources
                .iter()
                .all(|resource| statuses.contains(&resource.status.as_str()))
        },
        options,
        &format!("every {kind} to reach one of {statuses:?}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: WaitOptions = WaitOptions::new(Duration::from_millis(50), Duration::from_millis(1));

    #[test]
    fn ready_resource_returns_after_first_update() {
        let mut updates = 0;
        let value = wait_for(
            0,
            |v| {
                updates += 1;
                Ok(v + 1)
            },
            |v| *v == 1,
            FAST,
            "counter",
        )
        .unwrap();

        assert_eq!(1, value);
        assert_eq!(1, updates);
    }

    #[test]
    fn polls_until_ready() {
        let value = wait_for(0, |v| Ok(v + 1), |v| *v >= 3, FAST, "counter").unwrap();

        assert_eq!(3, value);
    }

    #[test]
    fn never_ready_times_out() {
        let err = wait_for((), |_| Ok(()), |_| false, FAST, "nothing").unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("nothing"));
    }

    #[test]
    fn update_errors_abort_the_wait() {
        let err = wait_for(
            (),
            |_| Err(CloudError::BadRequest("broken".to_string())),
            |_| true,
            FAST,
            "anything",
        )
        .unwrap_err();

        assert!(matches!(err, CloudError::BadRequest(_)));
    }
}
