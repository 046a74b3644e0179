use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Context;
use cloudstorm_client::prelude::{ClientBundle, ClientFactory, Credentials, Resource, ResourceKind};

use crate::config::RunPlan;
use crate::context::InitContext;
use crate::definition::CleanupHook;
use crate::error::RunError;
use crate::executor::Executor;
use crate::purge::{ignore_missing, purge_all, purge_identity_objects, PurgeSettings};

/// The name prefix shared by every identity object a run creates.
pub(crate) fn name_prefix(run_id: &str) -> String {
    format!("temp_{run_id}_")
}

struct ScenarioCleanup {
    hook: CleanupHook,
    context: serde_json::Value,
}

/// The tenants and users created for one run, and the clients that act as them.
///
/// Teardown happens exactly once: when [TemporaryIdentities::release] is called, or when the
/// value is dropped on any other path, including a failed provisioning and a panic.
pub(crate) struct TemporaryIdentities {
    run_id: String,
    name_prefix: String,
    admin: ClientBundle,
    executor: Executor,
    tenants: Vec<Resource>,
    users: Vec<Resource>,
    bundles: Vec<ClientBundle>,
    cleanup: Option<ScenarioCleanup>,
    concurrency: usize,
    settings: PurgeSettings,
    released: bool,
}

impl TemporaryIdentities {
    /// Create `tenants * users_per_tenant` identities and connect a client bundle for each.
    ///
    /// Anything created before a failure is torn down before the error is returned.
    pub(crate) fn provision(
        admin: ClientBundle,
        factory: &dyn ClientFactory,
        run_id: &str,
        plan: &RunPlan,
        executor: Executor,
        settings: PurgeSettings,
    ) -> Result<Self, RunError> {
        let mut identities = Self {
            run_id: run_id.to_string(),
            name_prefix: name_prefix(run_id),
            admin,
            executor,
            tenants: Vec::with_capacity(plan.tenants),
            users: Vec::with_capacity(plan.identities()),
            bundles: Vec::with_capacity(plan.identities()),
            cleanup: None,
            concurrency: plan.concurrency(),
            settings,
            released: false,
        };

        log::info!(
            "Creating {} tenant(s) with {} user(s) each for run {run_id}",
            plan.tenants,
            plan.users_per_tenant
        );
        let credentials = identities
            .create_identities(plan)
            .map_err(RunError::Provisioning)?;

        for credentials in &credentials {
            let bundle = factory
                .build(credentials)
                .with_context(|| format!("Could not build clients for {}", credentials.username))
                .map_err(RunError::Provisioning)?;
            identities.bundles.push(bundle);
        }

        Ok(identities)
    }

    fn create_identities(&mut self, plan: &RunPlan) -> anyhow::Result<Vec<Credentials>> {
        let mut credentials = Vec::with_capacity(plan.identities());

        for i in 0..plan.tenants {
            let tenant_name = format!("{}tenant_{i}", self.name_prefix);
            let tenant = self
                .admin
                .identity
                .create(ResourceKind::Tenant, &tenant_name)
                .with_context(|| format!("Could not create tenant {tenant_name}"))?;
            self.tenants.push(tenant.clone());

            for j in 0..plan.users_per_tenant {
                let username = format!("{}_user_{j}", tenant.name);
                let password = nanoid::nanoid!();
                let user = self
                    .admin
                    .identity
                    .create_user(
                        &username,
                        &password,
                        &format!("{username}@test.com"),
                        &tenant.id,
                    )
                    .with_context(|| format!("Could not create user {username}"))?;
                self.users.push(user);

                credentials.push(Credentials::new(
                    &username,
                    &password,
                    &tenant.name,
                    &self.admin.credentials.auth_url,
                ));
            }
        }

        Ok(credentials)
    }

    pub(crate) fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub(crate) fn bundles(&self) -> &[ClientBundle] {
        &self.bundles
    }

    /// Run the scenario's cleanup hook with `context` as part of teardown.
    pub(crate) fn set_cleanup(&mut self, hook: CleanupHook, context: serde_json::Value) {
        self.cleanup = Some(ScenarioCleanup { hook, context });
    }

    /// Tear everything down now.
    pub(crate) fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log::info!("Releasing temporary identities of run {}", self.run_id);

        if let Some(cleanup) = self.cleanup.take() {
            let mut ctx = InitContext::new(&self.admin, &self.executor, &self.name_prefix);
            match catch_unwind(AssertUnwindSafe(|| (cleanup.hook)(&mut ctx, &cleanup.context))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Unable to fully clean up after the scenario: {e:?}"),
                Err(_) => log::error!("Unable to fully clean up after the scenario, cleanup panicked"),
            }
        }

        purge_all(&self.bundles, self.concurrency, &self.settings);

        let identity = self.admin.identity.as_ref();
        for user in &self.users {
            if let Err(e) = ignore_missing(identity.delete(ResourceKind::User, &user.id)) {
                log::error!("Unable to fully clean up user {}: {e}", user.name);
            }
        }
        for tenant in &self.tenants {
            if let Err(e) = ignore_missing(identity.delete(ResourceKind::Tenant, &tenant.id)) {
                log::error!("Unable to fully clean up tenant {}: {e}", tenant.name);
            }
        }

        purge_identity_objects(&self.admin, &self.name_prefix);

        log::debug!(
            "Released {} user(s) in {} tenant(s) for run {}",
            self.users.len(),
            self.tenants.len(),
            self.run_id
        );
    }
}

impl Drop for TemporaryIdentities {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "Run {} ended without releasing its identities, tearing them down",
                self.run_id
            );
            self.teardown();
        }
    }
}
