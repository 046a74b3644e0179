use std::sync::Arc;

use cloudstorm_client::prelude::{ClientFactory, InMemoryCloud};
use cloudstorm_runner::prelude::*;

/// Images every project can boot from in the in-memory control plane.
const PUBLIC_IMAGES: [&str; 1] = ["cirros"];

fn main() -> CloudstormResult<()> {
    let cli = init();

    let mut registry = ScenarioRegistry::new();
    cloudstorm_nova_servers::register(&mut registry);

    run_cli(&cli, registry, |admin| {
        let cloud = InMemoryCloud::new(admin);
        for image in PUBLIC_IMAGES {
            cloud.seed_public_image(image);
        }
        let factory: Arc<dyn ClientFactory> = Arc::new(cloud);
        Ok(factory)
    })
}
