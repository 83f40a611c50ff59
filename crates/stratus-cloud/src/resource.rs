//! Provider resource models
//!
//! Every resource the CPI manages is observed, never assigned: status values
//! come from the provider and move toward a terminal ready or failed state.

use crate::api::ComputeApi;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider-reported status of a resource or an asynchronous operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Instance is being allocated
    Provisioning,
    /// Instance resources are acquired, booting
    Staging,
    /// Instance is running
    Running,
    /// Instance is shutting down
    Stopping,
    /// Instance is stopped
    Terminated,
    /// Image or operation is queued
    Pending,
    /// Disk or snapshot is being created
    Creating,
    /// Snapshot data is being uploaded
    Uploading,
    /// Disk, image or snapshot is usable
    Ready,
    /// Resource creation failed
    Failed,
    /// Resource is being deleted
    Deleting,
    /// Operation finished (successfully or not)
    Done,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Provisioning => "PROVISIONING",
            Status::Staging => "STAGING",
            Status::Running => "RUNNING",
            Status::Stopping => "STOPPING",
            Status::Terminated => "TERMINATED",
            Status::Pending => "PENDING",
            Status::Creating => "CREATING",
            Status::Uploading => "UPLOADING",
            Status::Ready => "READY",
            Status::Failed => "FAILED",
            Status::Deleting => "DELETING",
            Status::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// A provider resource that can be polled until it settles
#[async_trait]
pub trait CloudResource: Clone + Send + Sync + Sized {
    /// Lower-case resource kind used in log lines and error messages
    const KIND: &'static str;

    fn identity(&self) -> &str;

    fn status(&self) -> Status;

    fn is_ready(&self) -> bool;

    /// Terminal failure reported by the provider, if any
    fn failure(&self) -> Option<String> {
        (self.status() == Status::Failed).then(|| format!("status is `{}'", Status::Failed))
    }

    fn describe(&self) -> String {
        format!("{} `{}'", Self::KIND, self.identity())
    }

    /// Fetch the current state from the provider. `None` means the resource is gone.
    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>>;
}

/// A disk attached to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDisk {
    /// Self link of the attached disk
    pub source: String,
    pub device_name: String,
    pub boot: bool,
}

/// One `{key, value}` entry of instance metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

/// External IP binding of a network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub name: String,
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    /// Self link of the network
    pub network: String,
    pub network_ip: Option<String>,
    pub access_configs: Vec<AccessConfig>,
}

/// A virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub self_link: String,
    /// Zone self link
    pub zone: String,
    pub status: Status,
    pub machine_type: String,
    pub disks: Vec<AttachedDisk>,
    /// Provider stores metadata as a list, not a map
    pub metadata: Vec<MetadataItem>,
    pub tags: Vec<String>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub can_ip_forward: bool,
}

impl Instance {
    pub fn zone_name(&self) -> &str {
        resource_name(&self.zone)
    }

    pub fn primary_interface(&self) -> Option<&NetworkInterface> {
        self.network_interfaces.first()
    }

    /// External address bound to the first access config of the primary interface
    pub fn public_ip_address(&self) -> Option<&str> {
        self.primary_interface()?
            .access_configs
            .first()?
            .nat_ip
            .as_deref()
    }

    /// Name of the network the primary interface belongs to
    pub fn network_name(&self) -> Option<&str> {
        self.primary_interface().map(|nic| resource_name(&nic.network))
    }

    /// Metadata flattened into a map; later duplicates win
    pub fn metadata_map(&self) -> BTreeMap<String, String> {
        self.metadata
            .iter()
            .map(|item| (item.key.clone(), item.value.clone()))
            .collect()
    }

    pub fn find_attachment(&self, source: &str) -> Option<&AttachedDisk> {
        self.disks.iter().find(|d| d.source == source)
    }
}

#[async_trait]
impl CloudResource for Instance {
    const KIND: &'static str = "instance";

    fn identity(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn is_ready(&self) -> bool {
        self.status == Status::Running
    }

    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>> {
        api.get_instance(&self.name).await
    }
}

/// A persistent disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    pub status: Status,
    pub size_gb: u64,
    pub source_image: Option<String>,
}

impl Disk {
    pub fn zone_name(&self) -> &str {
        resource_name(&self.zone)
    }
}

#[async_trait]
impl CloudResource for Disk {
    const KIND: &'static str = "disk";

    fn identity(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>> {
        api.get_disk(&self.name).await
    }
}

/// A point-in-time copy of a disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub self_link: String,
    pub status: Status,
    pub source_disk: String,
    pub description: String,
}

#[async_trait]
impl CloudResource for Snapshot {
    const KIND: &'static str = "snapshot";

    fn identity(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>> {
        api.get_snapshot(&self.name).await
    }
}

/// A bootable machine image (stemcell)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub self_link: String,
    pub status: Status,
    pub description: String,
}

#[async_trait]
impl CloudResource for Image {
    const KIND: &'static str = "image";

    fn identity(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>> {
        api.get_image(&self.name).await
    }
}

/// Handle returned by every asynchronous mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    /// Zone name for zonal operations, `None` for global ones
    pub zone: Option<String>,
    pub status: Status,
    pub target_link: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
impl CloudResource for Operation {
    const KIND: &'static str = "operation";

    fn identity(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn is_ready(&self) -> bool {
        self.status == Status::Done
    }

    fn failure(&self) -> Option<String> {
        match (&self.status, &self.error) {
            (Status::Done, Some(error)) => Some(error.clone()),
            _ => None,
        }
    }

    async fn reload(&self, api: &dyn ComputeApi) -> Result<Option<Self>> {
        api.get_operation(&self.name, self.zone.as_deref()).await
    }
}

/// Machine shape available in a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineType {
    pub name: String,
    pub zone: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub self_link: String,
}

/// A reserved static external address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub address: String,
    pub region: String,
    /// Self links of the instances using the address
    pub users: Vec<String>,
}

impl Address {
    pub fn in_use(&self) -> bool {
        !self.users.is_empty()
    }

    /// Name of the instance currently bound to this address
    pub fn user(&self) -> Option<&str> {
        self.users.first().map(|link| resource_name(link))
    }
}

/// Load-balancer backend pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPool {
    pub name: String,
    pub self_link: String,
    pub region: String,
    /// Self links of member instances
    pub instances: Vec<String>,
}

impl TargetPool {
    pub fn contains(&self, instance: &Instance) -> bool {
        self.instances.iter().any(|link| link == &instance.self_link)
    }
}

/// Returns the last path segment of a resource link (`.../zones/us-central1-a` -> `us-central1-a`)
pub fn resource_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}
