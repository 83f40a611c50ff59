//! Provider API traits
//!
//! The CPI never talks HTTP to the compute or storage service itself; it goes
//! through these traits so the underlying SDK can be swapped (and faked in tests).

use crate::error::Result;
use crate::params::{DiskParams, ImageParams, InstanceParams, SnapshotParams};
use crate::resource::{
    Address, Disk, Image, Instance, MachineType, Network, Operation, Snapshot, TargetPool,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Compute service abstraction
///
/// Lookups return `Ok(None)` when the resource does not exist; `Err` is
/// reserved for failed provider calls. Mutations complete asynchronously and
/// return an [`Operation`] handle that must be polled until done.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_instance(&self, name: &str) -> Result<Option<Instance>>;

    /// Issue the create call. The returned instance is usually still provisioning.
    async fn insert_instance(&self, params: &InstanceParams) -> Result<Instance>;

    async fn delete_instance(&self, instance: &Instance) -> Result<Operation>;

    async fn reset_instance(&self, instance: &Instance) -> Result<Operation>;

    /// Replace all metadata items of an instance
    async fn set_instance_metadata(
        &self,
        instance: &Instance,
        metadata: &BTreeMap<String, String>,
    ) -> Result<Operation>;

    /// Replace all tags of an instance
    async fn set_instance_tags(&self, instance: &Instance, tags: &[String]) -> Result<Operation>;

    async fn attach_disk(&self, instance: &Instance, source: &str, writable: bool)
    -> Result<Operation>;

    async fn detach_disk(&self, instance: &Instance, device_name: &str) -> Result<Operation>;

    /// Attach an ephemeral external IP to a network interface
    async fn add_access_config(&self, instance: &Instance, interface: &str) -> Result<Operation>;

    async fn delete_access_config(
        &self,
        instance: &Instance,
        interface: &str,
        access_config: &str,
    ) -> Result<Operation>;

    async fn get_disk(&self, name: &str) -> Result<Option<Disk>>;

    async fn insert_disk(&self, params: &DiskParams) -> Result<Disk>;

    async fn delete_disk(&self, disk: &Disk) -> Result<Operation>;

    async fn create_snapshot(&self, disk: &Disk, params: &SnapshotParams) -> Result<Snapshot>;

    async fn get_snapshot(&self, name: &str) -> Result<Option<Snapshot>>;

    async fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<Operation>;

    async fn get_image(&self, name: &str) -> Result<Option<Image>>;

    async fn insert_image(&self, params: &ImageParams) -> Result<Image>;

    async fn delete_image(&self, image: &Image) -> Result<Operation>;

    async fn get_machine_type(&self, name: &str, zone: &str) -> Result<Option<MachineType>>;

    async fn get_network(&self, name: &str) -> Result<Option<Network>>;

    async fn get_address_by_ip(&self, ip: &str) -> Result<Option<Address>>;

    /// Bind a reserved address to an instance
    async fn assign_address(&self, address: &Address, instance: &Instance) -> Result<Operation>;

    /// Unbind a reserved address from an instance
    async fn release_address(&self, address: &Address, instance: &Instance) -> Result<Operation>;

    async fn get_target_pool(&self, name: &str) -> Result<Option<TargetPool>>;

    async fn add_target_pool_instance(
        &self,
        pool: &TargetPool,
        instance: &Instance,
    ) -> Result<Operation>;

    async fn get_operation(&self, name: &str, zone: Option<&str>) -> Result<Option<Operation>>;
}

/// Object ACLs used while staging images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    Private,
    PublicRead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub public_url: String,
}

/// Object storage abstraction used to stage stemcell tarballs
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn create_bucket(&self, name: &str, acl: Acl) -> Result<Bucket>;

    async fn upload_object(
        &self,
        bucket: &Bucket,
        key: &str,
        source: &Path,
        acl: Acl,
    ) -> Result<StoredObject>;

    /// Deletes `key` from `bucket`; the object may be partially written
    async fn delete_object(&self, bucket: &Bucket, key: &str) -> Result<()>;

    async fn delete_bucket(&self, bucket: &Bucket) -> Result<()>;
}
