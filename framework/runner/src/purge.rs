use cloudstorm_client::prelude::{
    status, wait_for_empty_list, wait_for_list_size, wait_for_list_statuses, ClientBundle,
    CloudError, CloudResult, ResourceApi, ResourceKind, WaitOptions,
};

/// How long purge steps wait for the control plane to catch up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSettings {
    pub wait: WaitOptions,
}

const BLOCK_STORAGE_ORDER: [ResourceKind; 5] = [
    ResourceKind::VolumeTransfer,
    ResourceKind::Volume,
    ResourceKind::VolumeType,
    ResourceKind::VolumeSnapshot,
    ResourceKind::VolumeBackup,
];

const IDENTITY_ORDER: [ResourceKind; 4] = [
    ResourceKind::User,
    ResourceKind::Tenant,
    ResourceKind::Service,
    ResourceKind::Role,
];

/// Delete everything the identity behind `bundle` may have created.
///
/// Every step is attempted even if an earlier one failed, so that as much as possible is removed.
pub(crate) fn purge_bundle(bundle: &ClientBundle, settings: &PurgeSettings) -> anyhow::Result<()> {
    let mut failures = Vec::new();
    let mut step = |kind: ResourceKind, result: CloudResult<()>| {
        if let Err(e) = result {
            failures.push(format!("{kind}: {e}"));
        }
    };

    let compute = bundle.compute.as_ref();
    step(ResourceKind::Server, delete_all(compute, ResourceKind::Server, settings));
    step(ResourceKind::KeyPair, delete_all(compute, ResourceKind::KeyPair, settings));
    step(ResourceKind::SecurityGroup, delete_security_groups(compute, settings));
    step(ResourceKind::Network, delete_all(compute, ResourceKind::Network, settings));

    step(ResourceKind::Image, delete_images(bundle.image.as_ref(), settings));

    for kind in BLOCK_STORAGE_ORDER {
        step(kind, delete_all(bundle.block_storage.as_ref(), kind, settings));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "Purge of project {} left resources behind: {}",
            bundle.project_id,
            failures.join("; ")
        )
    }
}

/// Purge every bundle, spreading the bundles over at most `concurrency` threads.
///
/// Failures are logged, never returned: a purge problem must not hide how the run went.
pub(crate) fn purge_all(bundles: &[ClientBundle], concurrency: usize, settings: &PurgeSettings) {
    if bundles.is_empty() {
        return;
    }

    let chunk_size = bundles.len().div_ceil(concurrency.max(1));
    std::thread::scope(|scope| {
        let handles = bundles
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    for bundle in chunk {
                        if let Err(e) = purge_bundle(bundle, settings) {
                            log::error!(
                                "Unable to fully clean up resources of {}: {e:#}",
                                bundle.credentials.username
                            );
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            if handle.join().is_err() {
                log::error!("Unable to fully clean up resources, a purge thread panicked");
            }
        }
    });
}

/// Delete identity objects left behind by a run. They are recognised by their name prefix.
pub(crate) fn purge_identity_objects(admin: &ClientBundle, name_prefix: &str) {
    let identity = admin.identity.as_ref();
    for kind in IDENTITY_ORDER {
        let leftovers = match identity.list(kind) {
            Ok(resources) => resources,
            Err(e) => {
                log::error!("Unable to fully clean up {kind} objects: {e}");
                continue;
            }
        };

        for resource in leftovers
            .iter()
            .filter(|resource| resource.name.starts_with(name_prefix))
        {
            log::debug!("Deleting leftover {kind} {}", resource.name);
            if let Err(e) = ignore_missing(identity.delete(kind, &resource.id)) {
                log::error!("Unable to fully clean up {kind} {}: {e}", resource.name);
            }
        }
    }
}

pub(crate) fn ignore_missing(result: CloudResult<()>) -> CloudResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

fn delete_all<A: ResourceApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    settings: &PurgeSettings,
) -> CloudResult<()> {
    for resource in api.list(kind)? {
        ignore_missing(api.delete(kind, &resource.id))?;
    }
    wait_for_empty_list(api, kind, settings.wait)
}

/// Every project has a system security group that only goes away with the project.
fn delete_security_groups<A: ResourceApi + ?Sized>(
    api: &A,
    settings: &PurgeSettings,
) -> CloudResult<()> {
    let kind = ResourceKind::SecurityGroup;
    for group in api.list(kind)? {
        match api.delete(kind, &group.id) {
            Err(CloudError::BadRequest(message))
                if message.contains("Unable to delete system group") =>
            {
                log::trace!("Leaving system security group {}", group.name);
            }
            other => ignore_missing(other)?,
        }
    }
    wait_for_list_size(api, kind, &[0, 1], settings.wait).map(|_| ())
}

/// Images are soft deleted, so wait for them to be marked deleted rather than to disappear.
fn delete_images<A: ResourceApi + ?Sized>(api: &A, settings: &PurgeSettings) -> CloudResult<()> {
    let kind = ResourceKind::Image;
    for image in api.list(kind)? {
        if !image.has_status(status::DELETED) {
            ignore_missing(api.delete(kind, &image.id))?;
        }
    }
    wait_for_list_statuses(api, kind, &[status::DELETED], settings.wait).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudstorm_client::prelude::{
        BootRequest, ClientFactory, Credentials, InMemoryCloud,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const FAST: PurgeSettings = PurgeSettings {
        wait: WaitOptions::new(Duration::from_millis(100), Duration::from_millis(1)),
    };

    fn member() -> (InMemoryCloud, ClientBundle, ClientBundle) {
        let admin_credentials = Credentials::new("admin", "admin", "admin", "http://localhost:5000/v2.0/");
        let cloud = InMemoryCloud::new(&admin_credentials);
        let admin = cloud.build(&admin_credentials).unwrap();
        let tenant = admin.identity.create(ResourceKind::Tenant, "temp_x_tenant_0").unwrap();
        admin
            .identity
            .create_user("temp_x_tenant_0_user_0", "pw", "u@test.com", &tenant.id)
            .unwrap();
        let member = cloud
            .build(&Credentials::new(
                "temp_x_tenant_0_user_0",
                "pw",
                "temp_x_tenant_0",
                "http://localhost:5000/v2.0/",
            ))
            .unwrap();
        (cloud, admin, member)
    }

    #[test]
    fn purge_leaves_only_the_system_group() {
        let (cloud, _admin, member) = member();
        let image = cloud.seed_public_image("cirros");

        let network = member.compute.create(ResourceKind::Network, "net").unwrap();
        member.compute.create(ResourceKind::KeyPair, "kp").unwrap();
        member.compute.create(ResourceKind::SecurityGroup, "sg").unwrap();
        let server = member
            .compute
            .boot_server(&BootRequest::new("vm", &image, "m1.tiny").with_network(&network.id))
            .unwrap();
        member.compute.create_server_image(&server.id, "snap").unwrap();
        for kind in BLOCK_STORAGE_ORDER {
            member.block_storage.create(kind, "bs").unwrap();
        }

        purge_bundle(&member, &FAST).unwrap();

        let owned = cloud
            .inventory()
            .owned_by(&member.project_id)
            .into_iter()
            .map(|resource| (resource.kind, resource.name.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![(ResourceKind::SecurityGroup, "default".to_string())],
            owned
        );
    }

    #[test]
    fn identity_purge_only_touches_the_prefix() {
        let (cloud, admin, _member) = member();
        admin.identity.create(ResourceKind::Role, "temp_x_role").unwrap();
        admin.identity.create(ResourceKind::Role, "keep_me").unwrap();

        purge_identity_objects(&admin, "temp_x_");

        let inventory = cloud.inventory();
        assert_eq!(vec!["admin".to_string()], inventory.tenants);
        assert_eq!(vec!["admin".to_string()], inventory.users);
        let roles = inventory
            .of_kind(ResourceKind::Role)
            .into_iter()
            .map(|role| role.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(vec!["keep_me".to_string()], roles);
    }
}
