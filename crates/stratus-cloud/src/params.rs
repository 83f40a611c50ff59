//! Creation parameters passed to the provider

use crate::error::CloudError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// What the provider does with a VM when its host goes into maintenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMaintenance {
    #[default]
    Migrate,
    Terminate,
}

impl FromStr for HostMaintenance {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MIGRATE" => Ok(HostMaintenance::Migrate),
            "TERMINATE" => Ok(HostMaintenance::Terminate),
            _ => Err(CloudError::cloud(
                "Invalid `on_host_maintenance' property: only `MIGRATE' or `TERMINATE' are supported",
            )),
        }
    }
}

impl std::fmt::Display for HostMaintenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostMaintenance::Migrate => write!(f, "MIGRATE"),
            HostMaintenance::Terminate => write!(f, "TERMINATE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduling {
    pub automatic_restart: bool,
    pub on_host_maintenance: HostMaintenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDisk {
    pub source_image: String,
    pub auto_delete: bool,
}

/// Parameters for creating a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceParams {
    pub name: String,
    pub zone: String,
    pub description: String,
    pub machine_type: String,
    pub boot_disk: BootDisk,
    /// Provider metadata is an opaque string map
    pub metadata: BTreeMap<String, String>,
    pub scheduling: Scheduling,
    /// `None` requests no service account scopes at all
    pub service_scopes: Option<Vec<String>>,
    pub network: String,
    pub tags: Vec<String>,
    /// Whether an ephemeral external IP is attached at boot
    pub external_ip: bool,
    pub can_ip_forward: bool,
}

/// Where a new disk's content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskSource {
    Blank { size_gb: u64 },
    Image { source_image: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskParams {
    pub name: String,
    pub zone: String,
    pub description: String,
    pub source: DiskSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotParams {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParams {
    pub name: String,
    pub description: String,
    /// URL of a raw disk tarball
    pub raw_disk: String,
}
