use crate::error::CloudResult;
use crate::resource::{Resource, ResourceKind};

/// Generic access to the resource collections a service owns.
///
/// Listing is scoped to the project of the identity the client was built for, apart from identity
/// objects which are only visible to administrators.
pub trait ResourceApi: Send + Sync {
    fn get(&self, kind: ResourceKind, id: &str) -> CloudResult<Resource>;

    fn list(&self, kind: ResourceKind) -> CloudResult<Vec<Resource>>;

    fn create(&self, kind: ResourceKind, name: &str) -> CloudResult<Resource>;

    fn delete(&self, kind: ResourceKind, id: &str) -> CloudResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRequest {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub networks: Vec<String>,
    pub key_name: Option<String>,
}

impl BootRequest {
    pub fn new(name: &str, image_id: &str, flavor_id: &str) -> Self {
        Self {
            name: name.to_string(),
            image_id: image_id.to_string(),
            flavor_id: flavor_id.to_string(),
            networks: Vec::new(),
            key_name: None,
        }
    }

    pub fn with_network(mut self, network_id: &str) -> Self {
        self.networks.push(network_id.to_string());
        self
    }

    pub fn with_key_name(mut self, key_name: &str) -> Self {
        self.key_name = Some(key_name.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    Reboot { soft: bool },
    Stop,
    Start,
    Rescue,
    Unrescue,
    Suspend,
    Resume,
}

impl ServerAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reboot { soft: true } => "soft_reboot",
            Self::Reboot { soft: false } => "hard_reboot",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Rescue => "rescue",
            Self::Unrescue => "unrescue",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }
}

pub trait ComputeApi: ResourceApi {
    fn boot_server(&self, request: &BootRequest) -> CloudResult<Resource>;

    fn server_action(&self, server_id: &str, action: ServerAction) -> CloudResult<()>;

    /// Snapshot a server into a new image, returning the image id.
    fn create_server_image(&self, server_id: &str, image_name: &str) -> CloudResult<String>;
}

pub trait IdentityApi: ResourceApi {
    fn create_user(
        &self,
        name: &str,
        password: &str,
        email: &str,
        tenant_id: &str,
    ) -> CloudResult<Resource>;
}

pub trait ImageApi: ResourceApi {
    /// Find an image the caller can boot from, public or owned, by its name.
    fn find_by_name(&self, name: &str) -> CloudResult<Resource>;
}

pub trait BlockStorageApi: ResourceApi {}
