use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::api::{BlockStorageApi, ComputeApi, IdentityApi, ImageApi};
use crate::credentials::Credentials;
use crate::error::CloudResult;

/// Connected clients for every service, all acting as one identity.
///
/// Cloning is cheap and shares the underlying clients.
#[derive(Clone)]
pub struct ClientBundle {
    pub credentials: Credentials,
    pub project_id: String,
    pub user_id: String,
    pub compute: Arc<dyn ComputeApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub image: Arc<dyn ImageApi>,
    pub block_storage: Arc<dyn BlockStorageApi>,
}

impl Debug for ClientBundle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBundle")
            .field("credentials", &self.credentials)
            .field("project_id", &self.project_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Builds a [ClientBundle] for a credential set.
pub trait ClientFactory: Send + Sync {
    fn build(&self, credentials: &Credentials) -> CloudResult<ClientBundle>;
}
