//! Persistent disk lifecycle

use std::sync::Arc;
use stratus_cloud::naming::{DISK_PREFIX, unique_name};
use stratus_cloud::{
    CloudError, CloudResource, ComputeApi, Disk, DiskParams, DiskSource, Image, ResourceWaiter,
    Result,
};

pub const DISK_DESCRIPTION: &str = "Disk managed by BOSH";
pub const MIN_DISK_SIZE_GIB: u64 = 1;
pub const MAX_DISK_SIZE_GIB: u64 = 10_000;

pub struct DiskManager {
    api: Arc<dyn ComputeApi>,
    waiter: ResourceWaiter,
}

impl DiskManager {
    pub fn new(api: Arc<dyn ComputeApi>, waiter: ResourceWaiter) -> Self {
        Self { api, waiter }
    }

    pub async fn get(&self, id: &str) -> Result<Disk> {
        match self.api.get_disk(id).await? {
            Some(disk) => Ok(disk),
            None => {
                tracing::error!("Disk `{}' not found", id);
                Err(CloudError::DiskNotFound(id.to_string()))
            }
        }
    }

    /// Create an empty disk of `size_mib` MiB, rounded up to whole GiB
    pub async fn create_blank(&self, size_mib: u64, zone: &str) -> Result<Disk> {
        let size_gb = size_mib.div_ceil(1024);
        if size_gb < MIN_DISK_SIZE_GIB {
            return Err(CloudError::cloud(format!(
                "Minimum disk size is 1 GiB and you set {} GiB",
                size_gb
            )));
        }
        if size_gb > MAX_DISK_SIZE_GIB {
            return Err(CloudError::cloud(format!(
                "Maximum disk size is 10 TiB and you set {} GiB",
                size_gb
            )));
        }

        self.create(DiskSource::Blank { size_gb }, zone).await
    }

    pub async fn create_from_image(&self, image: &Image, zone: &str) -> Result<Disk> {
        let source = DiskSource::Image {
            source_image: image.self_link.clone(),
        };
        self.create(source, zone).await
    }

    /// Only a ready disk can be deleted
    pub async fn delete(&self, id: &str) -> Result<()> {
        let disk = self.get(id).await?;
        if !disk.is_ready() {
            return Err(CloudError::cloud(format!(
                "Cannot delete disk `{}', status is `{}'",
                id, disk.status
            )));
        }

        let operation = self.api.delete_disk(&disk).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    async fn create(&self, source: DiskSource, zone: &str) -> Result<Disk> {
        let params = DiskParams {
            name: unique_name(DISK_PREFIX),
            zone: zone.to_string(),
            description: DISK_DESCRIPTION.to_string(),
            source,
        };
        tracing::debug!("Using disk params: {:?}", params);

        let disk = self.api.insert_disk(&params).await?;
        tracing::debug!("Creating new disk `{}'...", disk.name);
        self.waiter.wait_for(self.api.as_ref(), &disk).await
    }
}
