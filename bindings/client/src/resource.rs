use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resource statuses reported by the control plane.
pub mod status {
    pub const ACTIVE: &str = "ACTIVE";
    pub const SHUTOFF: &str = "SHUTOFF";
    pub const RESCUE: &str = "RESCUE";
    pub const SUSPENDED: &str = "SUSPENDED";
    pub const AVAILABLE: &str = "available";
    pub const DELETED: &str = "DELETED";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    Compute,
    Identity,
    Image,
    BlockStorage,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Identity => "identity",
            Self::Image => "image",
            Self::BlockStorage => "block-storage",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compute" => Ok(Self::Compute),
            "identity" => Ok(Self::Identity),
            "image" => Ok(Self::Image),
            "block-storage" => Ok(Self::BlockStorage),
            other => Err(format!("Unknown service `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Server,
    KeyPair,
    SecurityGroup,
    Network,
    Image,
    Volume,
    VolumeType,
    VolumeTransfer,
    VolumeSnapshot,
    VolumeBackup,
    Tenant,
    User,
    Service,
    Role,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 14] = [
        Self::Server,
        Self::KeyPair,
        Self::SecurityGroup,
        Self::Network,
        Self::Image,
        Self::Volume,
        Self::VolumeType,
        Self::VolumeTransfer,
        Self::VolumeSnapshot,
        Self::VolumeBackup,
        Self::Tenant,
        Self::User,
        Self::Service,
        Self::Role,
    ];

    pub fn service(self) -> ServiceKind {
        match self {
            Self::Server | Self::KeyPair | Self::SecurityGroup | Self::Network => {
                ServiceKind::Compute
            }
            Self::Image => ServiceKind::Image,
            Self::Volume
            | Self::VolumeType
            | Self::VolumeTransfer
            | Self::VolumeSnapshot
            | Self::VolumeBackup => ServiceKind::BlockStorage,
            Self::Tenant | Self::User | Self::Service | Self::Role => ServiceKind::Identity,
        }
    }

    pub fn is_identity(self) -> bool {
        self.service() == ServiceKind::Identity
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::KeyPair => "key_pair",
            Self::SecurityGroup => "security_group",
            Self::Network => "network",
            Self::Image => "image",
            Self::Volume => "volume",
            Self::VolumeType => "volume_type",
            Self::VolumeTransfer => "volume_transfer",
            Self::VolumeSnapshot => "volume_snapshot",
            Self::VolumeBackup => "volume_backup",
            Self::Tenant => "tenant",
            Self::User => "user",
            Self::Service => "service",
            Self::Role => "role",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control plane object as seen through one identity's clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub status: String,
    /// Project that owns the resource. Empty for identity objects and public images.
    pub owner: String,
}

impl Resource {
    pub fn has_status(&self, status: &str) -> bool {
        self.status == status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_a_service() {
        let identity = ResourceKind::ALL
            .iter()
            .filter(|kind| kind.is_identity())
            .count();
        assert_eq!(4, identity);
        assert_eq!(ServiceKind::Image, ResourceKind::Image.service());
        assert_eq!(
            ServiceKind::BlockStorage,
            ResourceKind::VolumeTransfer.service()
        );
    }

    #[test]
    fn service_names_parse() {
        assert_eq!(
            ServiceKind::BlockStorage,
            "block-storage".parse::<ServiceKind>().unwrap()
        );
        assert!("network".parse::<ServiceKind>().is_err());
    }
}
