//! Compute workloads for the Cloudstorm runner, registered as the `NovaServers` scenario.

mod actions;
mod servers;
mod utils;

use cloudstorm_runner::prelude::{ScenarioDefinitionBuilder, ScenarioRegistry};

pub use actions::{actions_from_args, parse_actions, BounceAction};
pub use servers::{boot_and_bounce_server, boot_and_delete_server, boot_server, snapshot_server};
pub use utils::{retry_fixed, Nova, ServerWaits};

pub const SCENARIO_NAME: &str = "NovaServers";

/// Register every `NovaServers` workload.
pub fn register(registry: &mut ScenarioRegistry) -> &mut ScenarioRegistry {
    registry.register(
        ScenarioDefinitionBuilder::new(SCENARIO_NAME)
            .use_validated_method(
                "boot_and_delete_server",
                boot_and_delete_server,
                utils::validate_image_and_flavor,
            )
            .use_validated_method(
                "boot_and_bounce_server",
                boot_and_bounce_server,
                servers::validate_bounce,
            )
            .use_validated_method(
                "snapshot_server",
                snapshot_server,
                utils::validate_image_and_flavor,
            )
            .use_validated_method("boot_server", boot_server, servers::validate_boot),
    )
}
