use cloudstorm_client::prelude::{BootRequest, ResourceKind};
use cloudstorm_runner::prelude::{Args, HookResult, InvalidArgumentsError, IterationContext};
use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::actions::actions_from_args;
use crate::utils::{f64_arg, string_arg, validate_image_and_flavor, Nova};

const SERVER_NAME_LEN: usize = 16;

/// Networks from the `nics` arg, given as `[{"net-id": "..."}]`.
fn nics(args: &Args) -> anyhow::Result<Option<Vec<String>>> {
    let Some(nics) = args.get("nics") else {
        return Ok(None);
    };
    let invalid =
        || InvalidArgumentsError::new(format!("nics must be a list of {{\"net-id\": id}}, got {nics}"));

    nics.as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|nic| {
            nic.get("net-id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(invalid)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(Into::into)
}

fn boot_request(
    name: &str,
    image_id: &str,
    args: &Args,
    networks: &[String],
) -> anyhow::Result<BootRequest> {
    let flavor_id = string_arg(args, "flavor_id")?
        .ok_or_else(|| InvalidArgumentsError::new("flavor_id is required"))?;

    let mut request = BootRequest::new(name, image_id, flavor_id);
    for network in networks {
        request = request.with_network(network);
    }
    if let Some(key_name) = string_arg(args, "key_name")? {
        request = request.with_key_name(key_name);
    }
    Ok(request)
}

/// Boot a server, pause for a random time between `min_sleep` and `max_sleep`, then delete it.
pub fn boot_and_delete_server(
    ctx: &mut IterationContext,
    args: &Args,
) -> HookResult<Option<Value>> {
    let nova = Nova::new(ctx, args)?;
    let image_id = nova.resolve_image(args)?;
    let networks = nics(args)?.unwrap_or_default();

    let request = boot_request(&ctx.random_name(SERVER_NAME_LEN), &image_id, args, &networks)?;
    let server = nova.boot(&request)?;
    ctx.sleep_between(f64_arg(args, "min_sleep", 0.0)?, f64_arg(args, "max_sleep", 0.0)?)?;
    nova.delete(&server)?;

    Ok(None)
}

/// Boot a server, put it through the configured `actions`, then delete it.
pub fn boot_and_bounce_server(
    ctx: &mut IterationContext,
    args: &Args,
) -> HookResult<Option<Value>> {
    let actions = actions_from_args(args)?;
    let nova = Nova::new(ctx, args)?;
    let image_id = nova.resolve_image(args)?;
    let networks = nics(args)?.unwrap_or_default();

    let request = boot_request(&ctx.random_name(SERVER_NAME_LEN), &image_id, args, &networks)?;
    let server = nova.boot(&request)?;
    for action in &actions {
        log::debug!("Applying {action} to server {}", server.id);
        action.apply(&nova, &server)?;
    }
    nova.delete(&server)?;

    Ok(Some(json!({"actions": actions.len()})))
}

/// Boot a server, snapshot it, boot a second server from the snapshot and remove everything.
pub fn snapshot_server(ctx: &mut IterationContext, args: &Args) -> HookResult<Option<Value>> {
    let nova = Nova::new(ctx, args)?;
    let image_id = nova.resolve_image(args)?;
    let networks = nics(args)?.unwrap_or_default();
    let name = ctx.random_name(SERVER_NAME_LEN);

    let server = nova.boot(&boot_request(&name, &image_id, args, &networks)?)?;
    let image = nova.create_image(&server)?;
    nova.delete(&server)?;

    let server = nova.boot(&boot_request(&name, &image.id, args, &networks)?)?;
    nova.delete(&server)?;
    nova.delete_image(&image)?;

    Ok(None)
}

/// Boot a server and leave it running. It is removed when the run's identities are torn down.
///
/// Without `nics`, the server is attached to a random network of the project, if it has any.
pub fn boot_server(ctx: &mut IterationContext, args: &Args) -> HookResult<Option<Value>> {
    let nova = Nova::new(ctx, args)?;
    let image_id = nova.resolve_image(args)?;
    let networks = match nics(args)? {
        Some(networks) => networks,
        None => nova
            .compute()
            .list(ResourceKind::Network)?
            .choose(&mut rand::thread_rng())
            .map(|network| vec![network.id.clone()])
            .unwrap_or_default(),
    };

    let request = boot_request(&ctx.random_name(SERVER_NAME_LEN), &image_id, args, &networks)?;
    let server = nova.boot(&request)?;

    Ok(Some(json!({"server_id": server.id, "networks": networks})))
}

pub(crate) fn validate_bounce(args: &Args) -> anyhow::Result<()> {
    validate_image_and_flavor(args)?;
    actions_from_args(args)?;
    Ok(())
}

pub(crate) fn validate_boot(args: &Args) -> anyhow::Result<()> {
    validate_image_and_flavor(args)?;
    nics(args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    #[test]
    fn nics_are_read_in_order() {
        let nics = nics(&args(json!({"nics": [{"net-id": "a"}, {"net-id": "b"}]})))
            .unwrap()
            .unwrap();

        assert_eq!(vec!["a".to_string(), "b".to_string()], nics);
    }

    #[test]
    fn malformed_nics_are_invalid_arguments() {
        let err = nics(&args(json!({"nics": ["a"]}))).unwrap_err();

        assert!(err.downcast_ref::<InvalidArgumentsError>().is_some());
    }

    #[test]
    fn boot_requests_carry_the_optional_args() {
        let request = boot_request(
            "vm",
            "img",
            &args(json!({"flavor_id": "m1.tiny", "key_name": "kp"})),
            &["net".to_string()],
        )
        .unwrap();

        assert_eq!(
            BootRequest::new("vm", "img", "m1.tiny")
                .with_network("net")
                .with_key_name("kp"),
            request
        );
    }

    #[test]
    fn bounce_validation_covers_the_actions() {
        let base = json!({"image_name": "cirros", "flavor_id": "m1.tiny"});
        assert!(validate_bounce(&args(base.clone())).is_ok());

        let mut bad = base;
        bad["actions"] = json!([{"explode": 1}]);
        let err = validate_bounce(&args(bad)).unwrap_err();
        assert!(err.to_string().contains("Invalid server actions configuration"));
    }
}
