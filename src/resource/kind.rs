//! Resource kinds
//!
//! The closed set of resource types the lister can produce and the purge
//! engine knows how to delete.

use super::Entity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A kind of API resource
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    KubernetesCluster,
    LoadBalancer,
    CertificateBundle,
    Network,
    NetworkPeering,
    Router,
    ObjectStorage,
    Database,
    Server,
    ServerGroup,
    Storage,
    Tag,
}

impl ResourceKind {
    /// Every kind, in the order resources are listed and displayed
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::KubernetesCluster,
        ResourceKind::LoadBalancer,
        ResourceKind::CertificateBundle,
        ResourceKind::Network,
        ResourceKind::NetworkPeering,
        ResourceKind::Router,
        ResourceKind::ObjectStorage,
        ResourceKind::Database,
        ResourceKind::Server,
        ResourceKind::ServerGroup,
        ResourceKind::Storage,
        ResourceKind::Tag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KubernetesCluster => "kubernetes-cluster",
            Self::LoadBalancer => "load-balancer",
            Self::CertificateBundle => "certificate-bundle",
            Self::Network => "network",
            Self::NetworkPeering => "network-peering",
            Self::Router => "router",
            Self::ObjectStorage => "object-storage",
            Self::Database => "database",
            Self::Server => "server",
            Self::ServerGroup => "server-group",
            Self::Storage => "storage",
            Self::Tag => "tag",
        }
    }

    /// Tags are addressed by name and have no UUID
    pub fn has_uuid(&self) -> bool {
        !matches!(self, Self::Tag)
    }

    /// Fixed inclusion rules that apply regardless of user patterns
    ///
    /// Service routers are managed by the platform and public storages are
    /// templates or CD-ROM images owned by the provider.
    pub fn retains(&self, entity: &Entity) -> bool {
        match self {
            Self::Router => entity.variant.as_deref() == Some("normal"),
            Self::Storage => entity.variant.as_deref() == Some("private"),
            _ => true,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown resource type: {}", s))
    }
}
