//! CPI orchestrator
//!
//! Every public method is one CPI call. Calls compose the resource managers
//! in a fixed order and keep the registry settings of a VM in step with the
//! provider. Read-modify-write of a VM's settings is not atomic: callers must
//! serialize operations that target the same VM.

use crate::config::CpiOptions;
use crate::disk_manager::DiskManager;
use crate::image_manager::ImageManager;
use crate::instance_manager::InstanceManager;
use crate::network::NetworkManager;
use crate::registry_manager::RegistryManager;
use crate::resource_pool::ResourcePool;
use crate::snapshot_manager::DiskSnapshotManager;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use stratus_cloud::{
    CloudError, ComputeApi, Instance, ResourceWaiter, Result, StorageApi, TaskCheckpoint,
};
use stratus_registry::{AgentSettings, HttpRegistryClient, NetworkSpec, RegistryClient};
use tracing::instrument;

const STEMCELL_INFRASTRUCTURE: &str = "google";

/// Properties shipped in a stemcell manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StemcellProperties {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub infrastructure: Option<String>,
    /// Image already hosted in object storage; skips the tarball upload
    #[serde(default)]
    pub source_url: Option<String>,
}

pub struct Cloud {
    options: CpiOptions,
    api: Arc<dyn ComputeApi>,
    waiter: ResourceWaiter,
    disks: DiskManager,
    snapshots: DiskSnapshotManager,
    images: ImageManager,
    instances: InstanceManager,
    registry: RegistryManager,
}

impl Cloud {
    pub fn new(
        options: CpiOptions,
        compute: Arc<dyn ComputeApi>,
        storage: Arc<dyn StorageApi>,
        registry: Arc<dyn RegistryClient>,
        checkpoint: TaskCheckpoint,
    ) -> Self {
        let waiter = ResourceWaiter::new(checkpoint.clone());

        Self {
            disks: DiskManager::new(compute.clone(), waiter.clone()),
            snapshots: DiskSnapshotManager::new(compute.clone(), waiter.clone()),
            images: ImageManager::new(compute.clone(), storage, waiter.clone()),
            instances: InstanceManager::new(compute.clone(), waiter.clone()),
            registry: RegistryManager::new(registry, checkpoint),
            api: compute,
            waiter,
            options,
        }
    }

    /// Build with an HTTP registry client for `options.registry`
    pub fn connect(
        options: CpiOptions,
        compute: Arc<dyn ComputeApi>,
        storage: Arc<dyn StorageApi>,
        checkpoint: TaskCheckpoint,
    ) -> Result<Self> {
        let registry = HttpRegistryClient::new(options.registry.clone())
            .map_err(|e| CloudError::Registry(e.to_string()))?;
        Ok(Self::new(
            options,
            compute,
            storage,
            Arc::new(registry),
            checkpoint,
        ))
    }

    pub fn options(&self) -> &CpiOptions {
        &self.options
    }

    #[instrument(skip(self, image_path, properties), fields(image_path = %image_path.display()))]
    pub async fn create_stemcell(
        &self,
        image_path: &Path,
        properties: &StemcellProperties,
    ) -> Result<String> {
        let infrastructure = properties.infrastructure.as_deref().unwrap_or("unknown");
        if infrastructure != STEMCELL_INFRASTRUCTURE {
            return Err(CloudError::cloud(format!(
                "Invalid Google Compute Engine stemcell, infrastructure is `{}'",
                infrastructure
            )));
        }

        tracing::info!("Creating new stemcell...");
        let description = format!("{}/{}", properties.name, properties.version);
        let image = match properties.source_url.as_deref() {
            Some(url) => self.images.create_from_url(url, &description).await?,
            None => self.images.create_from_tarball(image_path, &description).await?,
        };

        Ok(image.name)
    }

    #[instrument(skip(self))]
    pub async fn delete_stemcell(&self, stemcell_id: &str) -> Result<()> {
        tracing::info!("Deleting stemcell `{}'...", stemcell_id);
        self.images.delete(stemcell_id).await
    }

    /// Create and boot a VM, then publish its initial agent settings.
    ///
    /// Resource pool, zone, network and stemcell errors are returned as is.
    /// Anything failing from the instance creation step on, including its
    /// machine type lookup, is reported as `VmCreationFailed`; once the VM
    /// exists it is terminated first (best effort).
    #[instrument(skip(self, resource_pool, networks, disk_locality, environment))]
    pub async fn create_vm(
        &self,
        agent_id: &str,
        stemcell_id: &str,
        resource_pool: &Value,
        networks: &NetworkSpec,
        disk_locality: &[String],
        environment: Option<Value>,
    ) -> Result<String> {
        let pool = ResourcePool::parse(resource_pool)?;
        let zone = self
            .select_zone(pool.zone.as_deref(), disk_locality, &[])
            .await?;
        let network_manager = self.network_manager(networks)?;
        let image = self.images.get(stemcell_id).await?;

        tracing::info!("Creating new vm...");
        let vm = self
            .instances
            .create(
                &zone,
                &image,
                &pool,
                &network_manager,
                self.registry.endpoint(),
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to create vm: {}", e);
                creation_failed(e)
            })?;

        let provisioned: Result<()> = async {
            tracing::info!("Configuring network for vm `{}'...", vm.name);
            network_manager.configure(&vm).await?;

            tracing::info!("Updating agent settings for vm `{}'...", vm.name);
            let settings = AgentSettings::initial(&vm.name, agent_id, networks.clone(), environment)
                .with_defaults(&self.options.agent);
            self.registry.update(&vm.name, &settings).await
        }
        .await;

        match provisioned {
            Ok(()) => Ok(vm.name),
            Err(e) => {
                tracing::error!("Failed to create vm: {}", e);
                self.cleanup_failed_vm(&vm).await;
                Err(creation_failed(e))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        tracing::info!("Deleting vm `{}'...", vm_id);
        self.instances.terminate(vm_id).await?;

        tracing::info!("Deleting agent settings for vm `{}'...", vm_id);
        self.registry.delete(vm_id).await
    }

    #[instrument(skip(self))]
    pub async fn reboot_vm(&self, vm_id: &str) -> Result<()> {
        tracing::info!("Rebooting vm `{}'...", vm_id);
        self.instances.reboot(vm_id).await
    }

    #[instrument(skip(self))]
    pub async fn has_vm(&self, vm_id: &str) -> Result<bool> {
        tracing::info!("Checking if vm `{}' exists", vm_id);
        self.instances.exists(vm_id).await
    }

    #[instrument(skip(self, metadata))]
    pub async fn set_vm_metadata(
        &self,
        vm_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        tracing::info!("Setting metadata for vm `{}'", vm_id);
        self.instances.set_metadata(vm_id, metadata).await
    }

    #[instrument(skip(self, networks))]
    pub async fn configure_networks(&self, vm_id: &str, networks: &NetworkSpec) -> Result<()> {
        let vm = self.instances.get(vm_id).await?;

        tracing::info!("Updating network configuration for vm `{}'...", vm_id);
        self.network_manager(networks)?.update(&vm).await?;

        tracing::info!("Updating agent settings for vm `{}'...", vm_id);
        self.update_agent_settings(vm_id, |settings| {
            settings.networks = networks.clone();
        })
        .await
    }

    /// Create a blank disk in the zone of `vm_id`, or the default zone
    #[instrument(skip(self))]
    pub async fn create_disk(&self, size_mib: u64, vm_id: Option<&str>) -> Result<String> {
        let instances: Vec<String> = vm_id.map(str::to_string).into_iter().collect();
        let zone = self.select_zone(None, &[], &instances).await?;

        tracing::info!("Creating new disk...");
        let disk = self.disks.create_blank(size_mib, &zone).await?;
        Ok(disk.name)
    }

    #[instrument(skip(self))]
    pub async fn delete_disk(&self, disk_id: &str) -> Result<()> {
        tracing::info!("Deleting disk `{}'...", disk_id);
        self.disks.delete(disk_id).await
    }

    #[instrument(skip(self))]
    pub async fn attach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        let vm = self.instances.get(vm_id).await?;
        let disk = self.disks.get(disk_id).await?;

        tracing::info!("Attaching disk `{}' to vm `{}'...", disk_id, vm_id);
        let device_name = self.instances.attach_disk(&vm, &disk).await?;

        tracing::info!("Updating agent settings for vm `{}'...", vm_id);
        self.update_agent_settings(vm_id, |settings| {
            settings.add_persistent_disk(disk_id, device_name);
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn detach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        let vm = self.instances.get(vm_id).await?;
        let disk = self.disks.get(disk_id).await?;

        tracing::info!("Detaching disk `{}' from vm `{}'...", disk_id, vm_id);
        self.instances.detach_disk(&vm, &disk).await?;

        tracing::info!("Updating agent settings for vm `{}'...", vm_id);
        self.update_agent_settings(vm_id, |settings| {
            settings.remove_persistent_disk(disk_id);
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_disks(&self, vm_id: &str) -> Result<Vec<String>> {
        self.instances.attached_disks(vm_id).await
    }

    #[instrument(skip(self, metadata))]
    pub async fn snapshot_disk(&self, disk_id: &str, metadata: &Map<String, Value>) -> Result<String> {
        let disk = self.disks.get(disk_id).await?;

        tracing::info!("Creating new snapshot for disk `{}'...", disk_id);
        let snapshot = self.snapshots.create(&disk, metadata).await?;
        Ok(snapshot.name)
    }

    #[instrument(skip(self))]
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        tracing::info!("Deleting disk snapshot `{}'...", snapshot_id);
        self.snapshots.delete(snapshot_id).await
    }

    pub async fn validate_deployment(&self, _old_manifest: &Value, _new_manifest: &Value) -> Result<()> {
        Err(CloudError::NotImplemented("validate_deployment".to_string()))
    }

    fn network_manager(&self, networks: &NetworkSpec) -> Result<NetworkManager> {
        NetworkManager::new(self.api.clone(), self.waiter.clone(), networks)
    }

    /// The one zone shared by every affinity, else the default zone
    async fn select_zone(
        &self,
        pool_zone: Option<&str>,
        disk_ids: &[String],
        vm_ids: &[String],
    ) -> Result<String> {
        let mut zones: Vec<String> = pool_zone.map(str::to_string).into_iter().collect();

        for disk_id in disk_ids {
            let disk = self.disks.get(disk_id).await?;
            zones.push(disk.zone_name().to_string());
        }
        for vm_id in vm_ids {
            let vm = self.instances.get(vm_id).await?;
            zones.push(vm.zone_name().to_string());
        }

        let mut distinct: Vec<String> = Vec::with_capacity(zones.len());
        for zone in zones {
            if !distinct.contains(&zone) {
                distinct.push(zone);
            }
        }

        match distinct.as_slice() {
            [] => Ok(self.options.google.default_zone.clone()),
            [zone] => Ok(zone.clone()),
            _ => Err(CloudError::cloud(format!(
                "Can't use multiple zones: `{}'",
                distinct.join(", ")
            ))),
        }
    }

    async fn cleanup_failed_vm(&self, vm: &Instance) {
        tracing::info!("Deleting vm `{}'...", vm.name);
        if let Err(e) = self.instances.terminate(&vm.name).await {
            tracing::error!("Error cleaning up vm: {}", e);
        }
    }

    async fn update_agent_settings<F>(&self, vm_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut AgentSettings),
    {
        let mut settings = self.registry.read(vm_id).await?;
        update(&mut settings);
        self.registry.update(vm_id, &settings).await
    }
}

/// Cancellation passes through untouched
fn creation_failed(err: CloudError) -> CloudError {
    match err {
        CloudError::Cancelled(_) => err,
        other => CloudError::vm_creation_failed(other),
    }
}
