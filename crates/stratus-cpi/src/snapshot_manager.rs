//! Disk snapshot lifecycle

use serde_json::{Map, Value};
use std::sync::Arc;
use stratus_cloud::naming::{SNAPSHOT_PREFIX, unique_name};
use stratus_cloud::{
    CloudError, CloudResource, ComputeApi, Disk, ResourceWaiter, Result, Snapshot, SnapshotParams,
};

pub struct DiskSnapshotManager {
    api: Arc<dyn ComputeApi>,
    waiter: ResourceWaiter,
}

impl DiskSnapshotManager {
    pub fn new(api: Arc<dyn ComputeApi>, waiter: ResourceWaiter) -> Self {
        Self { api, waiter }
    }

    pub async fn get(&self, id: &str) -> Result<Snapshot> {
        self.api
            .get_snapshot(id)
            .await?
            .ok_or_else(|| CloudError::SnapshotNotFound(id.to_string()))
    }

    pub async fn create(&self, disk: &Disk, metadata: &Map<String, Value>) -> Result<Snapshot> {
        let params = SnapshotParams {
            name: unique_name(SNAPSHOT_PREFIX),
            description: description(metadata),
        };

        let snapshot = self.api.create_snapshot(disk, &params).await?;
        tracing::debug!(
            "Creating new disk snapshot `{}' from disk `{}'...",
            snapshot.name,
            disk.name
        );
        self.waiter.wait_for(self.api.as_ref(), &snapshot).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let snapshot = self.get(id).await?;
        if !snapshot.is_ready() {
            return Err(CloudError::cloud(format!(
                "Cannot delete disk snapshot `{}', status is `{}'",
                id, snapshot.status
            )));
        }

        let operation = self.api.delete_snapshot(&snapshot).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }
}

/// `deployment/job/index`; absent fields render empty
fn description(metadata: &Map<String, Value>) -> String {
    ["deployment", "job", "index"]
        .iter()
        .map(|key| match metadata.get(*key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
