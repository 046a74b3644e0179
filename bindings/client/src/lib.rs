mod api;
mod bundle;
mod credentials;
mod error;
mod memory;
mod resource;
mod wait;

pub mod prelude {
    pub use crate::api::{
        BlockStorageApi, BootRequest, ComputeApi, IdentityApi, ImageApi, ResourceApi, ServerAction,
    };
    pub use crate::bundle::{ClientBundle, ClientFactory};
    pub use crate::credentials::{Credentials, ADMIN_PORT};
    pub use crate::error::{CloudError, CloudResult};
    pub use crate::memory::{InMemoryCloud, Inventory};
    pub use crate::resource::{status, Resource, ResourceKind, ServiceKind};
    pub use crate::wait::{
        wait_for, wait_for_deletion, wait_for_empty_list, wait_for_list_size,
        wait_for_list_statuses, WaitOptions,
    };
}
