#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudstorm_client::prelude::{ClientFactory, Credentials, InMemoryCloud, WaitOptions};
use cloudstorm_runner::prelude::{
    Clock, PurgeSettings, RunOptions, RunnerSettings, ScenarioRegistry, ScenarioRunner,
};
use parking_lot::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn admin_credentials() -> Credentials {
    Credentials::new("admin", "admin", "admin", "http://localhost:5000/v2.0/")
}

pub fn cloud() -> InMemoryCloud {
    InMemoryCloud::new(&admin_credentials())
}

pub fn runner(registry: ScenarioRegistry, cloud: &InMemoryCloud) -> ScenarioRunner {
    init_logging();

    ScenarioRunner::new(Arc::new(registry), Arc::new(cloud.clone()), &admin_credentials())
        .unwrap()
        .with_settings(RunnerSettings {
            no_progress: true,
            purge: PurgeSettings {
                wait: WaitOptions::new(Duration::from_secs(1), Duration::from_millis(1)),
            },
        })
}

pub fn options(value: serde_json::Value) -> RunOptions {
    RunOptions::from_value(value).unwrap()
}

/// Assert that nothing but the administrator's own state and public images is left.
pub fn assert_clean(cloud: &InMemoryCloud) {
    let admin_project = cloud.build(&admin_credentials()).unwrap().project_id;
    let inventory = cloud.inventory();

    assert_eq!(vec!["admin".to_string()], inventory.tenants);
    assert_eq!(vec!["admin".to_string()], inventory.users);
    let leftovers = inventory
        .resources
        .iter()
        .filter(|resource| !resource.owner.is_empty() && resource.owner != admin_project)
        .collect::<Vec<_>>();
    assert!(leftovers.is_empty(), "Left behind: {leftovers:?}");
}

/// Records sleeps instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Clock for RecordingClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}
