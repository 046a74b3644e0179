mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use cloudstorm_client::prelude::ResourceKind;
use cloudstorm_runner::prelude::{
    Args, HookResult, InitContext, IterationContext, RunError, ScenarioDefinitionBuilder,
    ScenarioRegistry,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{assert_clean, cloud, options, runner};

/// Creates one of everything the purge knows about, as the iteration's identity.
fn create_everything(ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
    let clients = ctx.clients();
    let network = clients
        .compute
        .create(ResourceKind::Network, &ctx.random_name(8))?;
    clients
        .compute
        .create(ResourceKind::KeyPair, &ctx.random_name(8))?;
    clients
        .compute
        .create(ResourceKind::SecurityGroup, &ctx.random_name(8))?;
    clients
        .image
        .create(ResourceKind::Image, &ctx.random_name(8))?;
    for kind in [
        ResourceKind::Volume,
        ResourceKind::VolumeType,
        ResourceKind::VolumeSnapshot,
        ResourceKind::VolumeBackup,
        ResourceKind::VolumeTransfer,
    ] {
        clients.block_storage.create(kind, &ctx.random_name(8))?;
    }

    ctx.admin_clients()
        .identity
        .create(ResourceKind::Role, &ctx.random_name(8))?;

    Ok(Some(json!(network.id)))
}

fn create_then_pause(ctx: &mut IterationContext, args: &Args) -> HookResult<Option<Value>> {
    let output = create_everything(ctx, args)?;
    ctx.sleep_between(0.01, 0.02)?;
    Ok(output)
}

fn create_everything_then_fail(
    ctx: &mut IterationContext,
    args: &Args,
) -> HookResult<Option<Value>> {
    create_everything(ctx, args)?;
    anyhow::bail!("failed after creating resources")
}

fn registry() -> ScenarioRegistry {
    let mut registry = ScenarioRegistry::new();
    registry.register(
        ScenarioDefinitionBuilder::new("Fake")
            .use_method("create", create_everything)
            .use_method("create_then_pause", create_then_pause)
            .use_method("create_then_fail", create_everything_then_fail),
    );
    registry
}

#[test]
fn nothing_survives_a_successful_run() {
    let cloud = cloud();
    let runner = runner(registry(), &cloud);

    let results = runner
        .run(
            "Fake.create",
            &options(json!({"config": {"times": 6, "active_users": 3, "tenants": 2, "users_per_tenant": 2}})),
        )
        .unwrap();

    assert_eq!(6, results.len());
    assert!(results.iter().all(|result| result.is_success()));
    assert_clean(&cloud);
    assert!(cloud.inventory().of_kind(ResourceKind::Role).is_empty());
}

#[test]
fn nothing_survives_a_run_where_every_iteration_failed() {
    let cloud = cloud();
    let runner = runner(registry(), &cloud);

    let results = runner
        .run(
            "Fake.create_then_fail",
            &options(json!({"config": {"times": 3, "active_users": 2, "tenants": 2}})),
        )
        .unwrap();

    assert_eq!(3, results.len());
    assert!(results.iter().all(|result| !result.is_success()));
    assert_clean(&cloud);
}

#[test]
fn nothing_survives_a_duration_run() {
    let cloud = cloud();
    let runner = runner(registry(), &cloud);

    runner
        .run(
            "Fake.create_then_pause",
            &options(json!({"config": {"duration": 0.2, "active_users": 2}})),
        )
        .unwrap();

    assert_clean(&cloud);
}

#[test]
fn unknown_scenarios_have_no_side_effects() {
    let cloud = cloud();
    let before = cloud.inventory();
    let runner = runner(registry(), &cloud);

    let err = runner
        .run("Fake.missing", &options(json!({})))
        .unwrap_err();

    assert!(matches!(err, RunError::UnknownScenario { .. }));
    assert_eq!(before, cloud.inventory());
}

#[test]
fn invalid_configs_have_no_side_effects() {
    let cloud = cloud();
    let before = cloud.inventory();
    let runner = runner(registry(), &cloud);

    let err = runner
        .run(
            "Fake.create",
            &options(json!({"config": {"times": 2, "duration": 5}})),
        )
        .unwrap_err();

    assert!(matches!(err, RunError::InvalidConfig(_)));
    assert_eq!(before, cloud.inventory());
}

static VALIDATED_CALLS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn rejected_method_arguments_have_no_side_effects() {
    fn counted(_ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
        VALIDATED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn needs_flavor(args: &Args) -> HookResult {
        anyhow::ensure!(args.contains_key("flavor_id"), "flavor_id is required");
        Ok(())
    }

    let cloud = cloud();
    let before = cloud.inventory();
    let mut registry = ScenarioRegistry::new();
    registry.register(
        ScenarioDefinitionBuilder::new("Fake").use_validated_method("boot", counted, needs_flavor),
    );
    let runner = runner(registry, &cloud);

    let err = runner
        .run("Fake.boot", &options(json!({"config": {"times": 2}})))
        .unwrap_err();

    assert_eq!("This config is invalid: `flavor_id is required`", err.to_string());
    assert_eq!(0, VALIDATED_CALLS.load(Ordering::SeqCst));
    assert_eq!(before, cloud.inventory());
}

#[test]
fn failed_provisioning_removes_what_was_created() {
    let cloud = cloud();
    let runner = runner(registry(), &cloud);
    cloud.fail_user_creation_after(2);

    let err = runner
        .run(
            "Fake.create",
            &options(json!({"config": {"tenants": 2, "users_per_tenant": 2}})),
        )
        .unwrap_err();

    assert!(matches!(err, RunError::Provisioning(_)));
    assert_clean(&cloud);
}

#[test]
fn failed_client_builds_remove_the_identities() {
    let cloud = cloud();
    let runner = runner(registry(), &cloud);
    cloud.fail_client_builds(true);

    let err = runner
        .run("Fake.create", &options(json!({})))
        .unwrap_err();
    cloud.fail_client_builds(false);

    assert!(matches!(err, RunError::Provisioning(_)));
    assert_clean(&cloud);
}

static CLEANUP_CALLS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn scenario_cleanup_receives_the_init_context() {
    fn init(ctx: &mut InitContext, args: &Args) -> HookResult<Value> {
        let name = args
            .get("network_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| ctx.random_name(6));
        let network = ctx
            .admin_clients()
            .compute
            .create(ResourceKind::Network, &name)?;
        Ok(json!({"network_id": network.id}))
    }

    fn use_network(ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
        let network_id = ctx.context()["network_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no network in the context"))?;
        ctx.admin_clients()
            .compute
            .get(ResourceKind::Network, network_id)?;
        Ok(Some(json!(network_id)))
    }

    fn cleanup(ctx: &mut InitContext, context: &Value) -> HookResult {
        CLEANUP_CALLS.fetch_add(1, Ordering::SeqCst);
        let network_id = context["network_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no network in the context"))?;
        ctx.admin_clients()
            .compute
            .delete(ResourceKind::Network, network_id)?;
        Ok(())
    }

    let cloud = cloud();
    let mut registry = ScenarioRegistry::new();
    registry.register(
        ScenarioDefinitionBuilder::new("Shared")
            .use_init(init)
            .use_cleanup(cleanup)
            .use_method("use_network", use_network),
    );
    let runner = runner(registry, &cloud);

    let results = runner
        .run(
            "Shared.use_network",
            &options(json!({"init": {"network_name": "shared"}, "config": {"times": 2}})),
        )
        .unwrap();

    assert!(results.iter().all(|result| result.is_success()));
    assert_eq!(results[0].output, results[1].output);
    assert_eq!(1, CLEANUP_CALLS.load(Ordering::SeqCst));
    assert!(cloud.inventory().of_kind(ResourceKind::Network).is_empty());
}

#[test]
fn init_failure_is_a_provisioning_error_and_still_cleans_up() {
    fn init(_ctx: &mut InitContext, _args: &Args) -> HookResult<Value> {
        anyhow::bail!("no quota for the shared network")
    }

    fn never(_ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<Value>> {
        panic!("iterations must not run when init fails")
    }

    let cloud = cloud();
    let mut registry = ScenarioRegistry::new();
    registry.register(
        ScenarioDefinitionBuilder::new("Broken")
            .use_init(init)
            .use_method("never", never),
    );
    let runner = runner(registry, &cloud);

    let err = runner
        .run("Broken.never", &options(json!({})))
        .unwrap_err();

    assert!(matches!(err, RunError::Provisioning(_)));
    assert!(err.to_string().contains("no quota for the shared network"));
    assert_clean(&cloud);
}
