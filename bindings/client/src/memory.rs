use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{
    BlockStorageApi, BootRequest, ComputeApi, IdentityApi, ImageApi, ResourceApi, ServerAction,
};
use crate::bundle::{ClientBundle, ClientFactory};
use crate::credentials::Credentials;
use crate::error::{CloudError, CloudResult};
use crate::resource::{status, Resource, ResourceKind};

const SYSTEM_SECURITY_GROUP: &str = "default";

/// A control plane that lives entirely in memory.
///
/// It behaves like a small cloud: identities authenticate with a password, resources belong to the
/// project of the identity that created them, identity objects can only be managed by an
/// administrator and every tenant comes with a `default` security group that cannot be deleted.
/// It is used to run workloads without a real cloud and to check that runs leave nothing behind.
#[derive(Debug, Clone)]
pub struct InMemoryCloud {
    state: Arc<Mutex<CloudState>>,
}

/// What the control plane holds at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub tenants: Vec<String>,
    pub users: Vec<String>,
    /// Every other resource that still exists. Soft deleted images are not included.
    pub resources: Vec<Resource>,
}

impl Inventory {
    pub fn owned_by(&self, project_id: &str) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|resource| resource.owner == project_id)
            .collect()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|resource| resource.kind == kind)
            .collect()
    }
}

#[derive(Debug, Clone)]
struct UserSecret {
    password: String,
    tenant_id: String,
    admin: bool,
}

#[derive(Debug, Clone)]
struct Scope {
    user_id: String,
    project_id: String,
    admin: bool,
}

#[derive(Debug, Default)]
struct Faults {
    user_creations_left: Option<usize>,
    fail_client_builds: bool,
}

#[derive(Debug, Default)]
struct CloudState {
    next_id: u64,
    resources: BTreeMap<String, Resource>,
    secrets: BTreeMap<String, UserSecret>,
    faults: Faults,
}

fn id_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Server => "srv",
        ResourceKind::KeyPair => "kp",
        ResourceKind::SecurityGroup => "sg",
        ResourceKind::Network => "net",
        ResourceKind::Image => "img",
        ResourceKind::Volume => "vol",
        ResourceKind::VolumeType => "vt",
        ResourceKind::VolumeTransfer => "xfer",
        ResourceKind::VolumeSnapshot => "snap",
        ResourceKind::VolumeBackup => "bak",
        ResourceKind::Tenant => "tenant",
        ResourceKind::User => "user",
        ResourceKind::Service => "svc",
        ResourceKind::Role => "role",
    }
}

fn initial_status(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Volume
        | ResourceKind::VolumeSnapshot
        | ResourceKind::VolumeBackup
        | ResourceKind::VolumeTransfer => status::AVAILABLE,
        _ => status::ACTIVE,
    }
}

impl CloudState {
    fn insert(&mut self, kind: ResourceKind, name: &str, owner: &str) -> Resource {
        self.next_id += 1;
        let resource = Resource {
            id: format!("{}-{:06}", id_prefix(kind), self.next_id),
            name: name.to_string(),
            kind,
            status: initial_status(kind).to_string(),
            owner: owner.to_string(),
        };
        self.resources.insert(resource.id.clone(), resource.clone());
        resource
    }

    fn find_by_name(&self, kind: ResourceKind, name: &str) -> Option<&Resource> {
        self.resources
            .values()
            .find(|resource| resource.kind == kind && resource.name == name)
    }

    fn insert_tenant(&mut self, name: &str) -> CloudResult<Resource> {
        if self.find_by_name(ResourceKind::Tenant, name).is_some() {
            return Err(CloudError::BadRequest(format!(
                "Tenant `{name}` already exists"
            )));
        }

        let tenant = self.insert(ResourceKind::Tenant, name, "");
        self.insert(ResourceKind::SecurityGroup, SYSTEM_SECURITY_GROUP, &tenant.id);
        Ok(tenant)
    }

    fn insert_user(
        &mut self,
        name: &str,
        password: &str,
        tenant_id: &str,
        admin: bool,
    ) -> CloudResult<Resource> {
        if self.find_by_name(ResourceKind::User, name).is_some() {
            return Err(CloudError::BadRequest(format!("User `{name}` already exists")));
        }
        if !self.exists(ResourceKind::Tenant, tenant_id) {
            return Err(CloudError::not_found(ResourceKind::Tenant, tenant_id));
        }

        let user = self.insert(ResourceKind::User, name, "");
        self.secrets.insert(
            user.id.clone(),
            UserSecret {
                password: password.to_string(),
                tenant_id: tenant_id.to_string(),
                admin,
            },
        );
        Ok(user)
    }

    fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.resources
            .get(id)
            .is_some_and(|resource| resource.kind == kind)
    }

    fn authenticate(&self, credentials: &Credentials) -> CloudResult<Scope> {
        let unauthorized = || CloudError::Unauthorized {
            username: credentials.username.clone(),
            tenant_name: credentials.tenant_name.clone(),
        };

        let tenant = self
            .find_by_name(ResourceKind::Tenant, &credentials.tenant_name)
            .ok_or_else(unauthorized)?;
        let user = self
            .find_by_name(ResourceKind::User, &credentials.username)
            .ok_or_else(unauthorized)?;
        let secret = self.secrets.get(&user.id).ok_or_else(unauthorized)?;

        if secret.password != credentials.password || secret.tenant_id != tenant.id {
            return Err(unauthorized());
        }

        Ok(Scope {
            user_id: user.id.clone(),
            project_id: tenant.id.clone(),
            admin: secret.admin,
        })
    }

    /// Look up a resource the scope is allowed to see.
    fn visible(&self, scope: &Scope, kind: ResourceKind, id: &str) -> CloudResult<&Resource> {
        let resource = self
            .resources
            .get(id)
            .filter(|resource| resource.kind == kind)
            .ok_or_else(|| CloudError::not_found(kind, id))?;

        let visible = kind.is_identity()
            || resource.owner == scope.project_id
            || (kind == ResourceKind::Image && resource.owner.is_empty());
        if visible {
            Ok(resource)
        } else {
            Err(CloudError::not_found(kind, id))
        }
    }

    fn set_status(&mut self, id: &str, new_status: &str) {
        if let Some(resource) = self.resources.get_mut(id) {
            resource.status = new_status.to_string();
        }
    }
}

impl InMemoryCloud {
    /// Create a control plane with a single administrator, described by `admin`.
    pub fn new(admin: &Credentials) -> Self {
        let mut state = CloudState::default();
        // A fresh state has no tenants or users, so neither insert can conflict.
        if let Ok(tenant) = state.insert_tenant(&admin.tenant_name) {
            let _ = state.insert_user(&admin.username, &admin.password, &tenant.id, true);
        }

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Publish an image that every project can boot from.
    pub fn seed_public_image(&self, name: &str) -> String {
        self.state.lock().insert(ResourceKind::Image, name, "").id
    }

    /// Let `successful` more users be created, then fail every further user creation.
    pub fn fail_user_creation_after(&self, successful: usize) {
        self.state.lock().faults.user_creations_left = Some(successful);
    }

    /// Make [ClientFactory::build] fail, for example to simulate an unreachable endpoint.
    pub fn fail_client_builds(&self, fail: bool) {
        self.state.lock().faults.fail_client_builds = fail;
    }

    pub fn inventory(&self) -> Inventory {
        let state = self.state.lock();
        let names_of = |kind: ResourceKind| {
            state
                .resources
                .values()
                .filter(|resource| resource.kind == kind)
                .map(|resource| resource.name.clone())
                .collect::<Vec<_>>()
        };

        Inventory {
            tenants: names_of(ResourceKind::Tenant),
            users: names_of(ResourceKind::User),
            resources: state
                .resources
                .values()
                .filter(|resource| {
                    !matches!(resource.kind, ResourceKind::Tenant | ResourceKind::User)
                        && !resource.has_status(status::DELETED)
                })
                .cloned()
                .collect(),
        }
    }
}

impl ClientFactory for InMemoryCloud {
    fn build(&self, credentials: &Credentials) -> CloudResult<ClientBundle> {
        let scope = {
            let state = self.state.lock();
            if state.faults.fail_client_builds {
                return Err(CloudError::BadRequest(format!(
                    "Could not reach the control plane at `{}`",
                    credentials.auth_url
                )));
            }
            state.authenticate(credentials)?
        };

        log::trace!(
            "Built clients for user {} in project {}",
            scope.user_id,
            scope.project_id
        );

        let client = Arc::new(InMemoryClient {
            state: self.state.clone(),
            scope: scope.clone(),
        });

        Ok(ClientBundle {
            credentials: credentials.clone(),
            project_id: scope.project_id,
            user_id: scope.user_id,
            compute: client.clone(),
            identity: client.clone(),
            image: client.clone(),
            block_storage: client,
        })
    }
}

/// Clients for one authenticated identity.
struct InMemoryClient {
    state: Arc<Mutex<CloudState>>,
    scope: Scope,
}

impl InMemoryClient {
    fn require_admin(&self, operation: &str) -> CloudResult<()> {
        if self.scope.admin {
            Ok(())
        } else {
            Err(CloudError::Forbidden(operation.to_string()))
        }
    }
}

impl ResourceApi for InMemoryClient {
    fn get(&self, kind: ResourceKind, id: &str) -> CloudResult<Resource> {
        if kind.is_identity() {
            self.require_admin(&format!("get {kind}"))?;
        }

        let state = self.state.lock();
        state.visible(&self.scope, kind, id).cloned()
    }

    fn list(&self, kind: ResourceKind) -> CloudResult<Vec<Resource>> {
        if kind.is_identity() {
            self.require_admin(&format!("list {kind}"))?;
        }

        let state = self.state.lock();
        Ok(state
            .resources
            .values()
            .filter(|resource| resource.kind == kind)
            .filter(|resource| kind.is_identity() || resource.owner == self.scope.project_id)
            .cloned()
            .collect())
    }

    fn create(&self, kind: ResourceKind, name: &str) -> CloudResult<Resource> {
        match kind {
            ResourceKind::Server => Err(CloudError::BadRequest(
                "Servers must be created with boot_server".to_string(),
            )),
            ResourceKind::User => Err(CloudError::BadRequest(
                "Users must be created with create_user".to_string(),
            )),
            ResourceKind::Tenant => {
                self.require_admin("create tenant")?;
                self.state.lock().insert_tenant(name)
            }
            ResourceKind::Service | ResourceKind::Role => {
                self.require_admin(&format!("create {kind}"))?;
                Ok(self.state.lock().insert(kind, name, ""))
            }
            _ => Ok(self
                .state
                .lock()
                .insert(kind, name, &self.scope.project_id)),
        }
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> CloudResult<()> {
        if kind.is_identity() {
            self.require_admin(&format!("delete {kind}"))?;
        }

        let mut state = self.state.lock();
        let resource = state.visible(&self.scope, kind, id)?.clone();

        match kind {
            ResourceKind::SecurityGroup if resource.name == SYSTEM_SECURITY_GROUP => {
                Err(CloudError::BadRequest(format!(
                    "Unable to delete system group '{SYSTEM_SECURITY_GROUP}'"
                )))
            }
            ResourceKind::Image => {
                if resource.has_status(status::DELETED) {
                    return Err(CloudError::not_found(kind, id));
                }
                state.set_status(id, status::DELETED);
                Ok(())
            }
            ResourceKind::Tenant => {
                // The system group goes away with its tenant, everything else is left behind.
                state.resources.retain(|_, other| {
                    !(other.kind == ResourceKind::SecurityGroup
                        && other.owner == resource.id
                        && other.name == SYSTEM_SECURITY_GROUP)
                });
                state.resources.remove(id);
                Ok(())
            }
            ResourceKind::User => {
                state.secrets.remove(id);
                state.resources.remove(id);
                Ok(())
            }
            _ => {
                state.resources.remove(id);
                Ok(())
            }
        }
    }
}

impl ComputeApi for InMemoryClient {
    fn boot_server(&self, request: &BootRequest) -> CloudResult<Resource> {
        let mut state = self.state.lock();

        let image = state.visible(&self.scope, ResourceKind::Image, &request.image_id)?;
        if !image.has_status(status::ACTIVE) {
            return Err(CloudError::BadRequest(format!(
                "Image `{}` is not active",
                request.image_id
            )));
        }
        for network in &request.networks {
            state.visible(&self.scope, ResourceKind::Network, network)?;
        }
        if let Some(key_name) = &request.key_name {
            let owned = state.resources.values().any(|resource| {
                resource.kind == ResourceKind::KeyPair
                    && resource.name == *key_name
                    && resource.owner == self.scope.project_id
            });
            if !owned {
                return Err(CloudError::not_found(ResourceKind::KeyPair, key_name));
            }
        }

        Ok(state.insert(ResourceKind::Server, &request.name, &self.scope.project_id))
    }

    fn server_action(&self, server_id: &str, action: ServerAction) -> CloudResult<()> {
        let mut state = self.state.lock();
        let server = state.visible(&self.scope, ResourceKind::Server, server_id)?;

        let (from, to) = match action {
            ServerAction::Reboot { .. } => (status::ACTIVE, status::ACTIVE),
            ServerAction::Stop => (status::ACTIVE, status::SHUTOFF),
            ServerAction::Start => (status::SHUTOFF, status::ACTIVE),
            ServerAction::Rescue => (status::ACTIVE, status::RESCUE),
            ServerAction::Unrescue => (status::RESCUE, status::ACTIVE),
            ServerAction::Suspend => (status::ACTIVE, status::SUSPENDED),
            ServerAction::Resume => (status::SUSPENDED, status::ACTIVE),
        };

        if !server.has_status(from) {
            return Err(CloudError::BadRequest(format!(
                "Cannot '{}' instance {} while it is in state {}",
                action.name(),
                server_id,
                server.status
            )));
        }

        state.set_status(server_id, to);
        Ok(())
    }

    fn create_server_image(&self, server_id: &str, image_name: &str) -> CloudResult<String> {
        let mut state = self.state.lock();
        state.visible(&self.scope, ResourceKind::Server, server_id)?;

        Ok(state
            .insert(ResourceKind::Image, image_name, &self.scope.project_id)
            .id)
    }
}

impl IdentityApi for InMemoryClient {
    fn create_user(
        &self,
        name: &str,
        password: &str,
        email: &str,
        tenant_id: &str,
    ) -> CloudResult<Resource> {
        self.require_admin("create user")?;

        let mut state = self.state.lock();
        if let Some(left) = state.faults.user_creations_left.as_mut() {
            if *left == 0 {
                return Err(CloudError::BadRequest(format!(
                    "User quota exceeded, could not create `{name}`"
                )));
            }
            *left -= 1;
        }

        log::trace!("Creating user {name} <{email}> in tenant {tenant_id}");
        state.insert_user(name, password, tenant_id, false)
    }
}

impl ImageApi for InMemoryClient {
    fn find_by_name(&self, name: &str) -> CloudResult<Resource> {
        let state = self.state.lock();
        state
            .resources
            .values()
            .find(|resource| {
                resource.kind == ResourceKind::Image
                    && resource.name == name
                    && !resource.has_status(status::DELETED)
                    && (resource.owner.is_empty() || resource.owner == self.scope.project_id)
            })
            .cloned()
            .ok_or_else(|| CloudError::not_found(ResourceKind::Image, name))
    }
}

impl BlockStorageApi for InMemoryClient {}
