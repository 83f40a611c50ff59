//! VM lifecycle

use crate::network::NetworkManager;
use crate::resource_pool::ResourcePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use stratus_cloud::naming::{VM_PREFIX, unique_name};
use stratus_cloud::{
    BootDisk, CloudError, ComputeApi, Disk, Image, Instance, InstanceParams, ResourceWaiter,
    Result, resource_name,
};
use stratus_registry::{USER_DATA_KEY, UserData};

pub const INSTANCE_DESCRIPTION: &str = "Instance managed by BOSH";

/// Provider limits on metadata items, in characters
pub const MAX_METADATA_KEY_LENGTH: usize = 128;
pub const MAX_METADATA_VALUE_LENGTH: usize = 32768;

pub struct InstanceManager {
    api: Arc<dyn ComputeApi>,
    waiter: ResourceWaiter,
}

impl InstanceManager {
    pub fn new(api: Arc<dyn ComputeApi>, waiter: ResourceWaiter) -> Self {
        Self { api, waiter }
    }

    pub async fn get(&self, id: &str) -> Result<Instance> {
        self.api
            .get_instance(id)
            .await?
            .ok_or_else(|| CloudError::VmNotFound(id.to_string()))
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(CloudError::VmNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a VM booting `image` and wait until it runs.
    ///
    /// A failure while waiting is reported as `VmCreationFailed`; validation
    /// failures before the create call are returned unchanged.
    pub async fn create(
        &self,
        zone: &str,
        image: &Image,
        pool: &ResourcePool,
        networks: &NetworkManager,
        registry_endpoint: &str,
    ) -> Result<Instance> {
        let name = unique_name(VM_PREFIX);

        let machine_type = self
            .api
            .get_machine_type(&pool.instance_type, zone)
            .await?
            .ok_or_else(|| {
                CloudError::cloud(format!("Machine Type `{}' not found", pool.instance_type))
            })?;

        let user_data = UserData::new(&name, registry_endpoint, networks.dns().to_vec());
        let mut metadata = BTreeMap::new();
        metadata.insert(USER_DATA_KEY.to_string(), serde_json::to_string(&user_data)?);

        let params = InstanceParams {
            name: name.clone(),
            zone: zone.to_string(),
            description: INSTANCE_DESCRIPTION.to_string(),
            machine_type: machine_type.name,
            boot_disk: BootDisk {
                source_image: image.self_link.clone(),
                auto_delete: true,
            },
            metadata,
            scheduling: pool.scheduling(),
            service_scopes: pool.service_scopes.clone(),
            network: networks.network_name().await?,
            tags: networks.tags().to_vec(),
            external_ip: networks.ephemeral_external_ip(),
            can_ip_forward: networks.ip_forwarding(),
        };
        tracing::debug!("Using instance params: {:?}", params);

        let instance = self.api.insert_instance(&params).await?;
        tracing::debug!("Creating new instance `{}'...", instance.name);

        match self.waiter.wait_for(self.api.as_ref(), &instance).await {
            Ok(ready) => Ok(ready),
            Err(err @ CloudError::Cancelled(_)) => Err(err),
            Err(err) => Err(CloudError::vm_creation_failed(err)),
        }
    }

    pub async fn terminate(&self, id: &str) -> Result<()> {
        let instance = self.get(id).await?;
        tracing::debug!("Deleting instance `{}'...", id);
        let operation = self.api.delete_instance(&instance).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    pub async fn reboot(&self, id: &str) -> Result<()> {
        let instance = self.get(id).await?;
        tracing::debug!("Rebooting instance `{}'...", id);
        let operation = self.api.reset_instance(&instance).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    /// Merge `metadata` into the instance's items; new keys win
    pub async fn set_metadata(&self, id: &str, metadata: &BTreeMap<String, String>) -> Result<()> {
        if metadata.is_empty() {
            return Ok(());
        }

        let instance = self.get(id).await?;
        let mut merged = instance.metadata_map();
        for (key, value) in metadata {
            merged.insert(
                truncate(key, MAX_METADATA_KEY_LENGTH),
                truncate(value, MAX_METADATA_VALUE_LENGTH),
            );
        }

        tracing::debug!("Setting metadata of instance `{}'...", id);
        let operation = self.api.set_instance_metadata(&instance, &merged).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    /// Attach `disk` read-write and return the device name the provider assigned
    pub async fn attach_disk(&self, instance: &Instance, disk: &Disk) -> Result<String> {
        tracing::debug!(
            "Attaching disk `{}' to instance `{}'...",
            disk.name,
            instance.name
        );
        let operation = self
            .api
            .attach_disk(instance, &disk.self_link, true)
            .await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;

        let reloaded = self.get(&instance.name).await?;
        reloaded
            .find_attachment(&disk.self_link)
            .map(|attachment| attachment.device_name.clone())
            .ok_or_else(|| {
                CloudError::cloud(format!(
                    "Unable to attach disk `{}' to vm `{}'",
                    disk.name, instance.name
                ))
            })
    }

    pub async fn detach_disk(&self, instance: &Instance, disk: &Disk) -> Result<()> {
        let device_name = instance
            .find_attachment(&disk.self_link)
            .map(|attachment| attachment.device_name.clone())
            .ok_or_else(|| CloudError::DiskNotAttached {
                disk: disk.name.clone(),
                vm: instance.name.clone(),
            })?;

        tracing::debug!(
            "Detaching disk `{}' from instance `{}'...",
            disk.name,
            instance.name
        );
        let operation = self.api.detach_disk(instance, &device_name).await?;
        self.waiter.wait_for(self.api.as_ref(), &operation).await?;
        Ok(())
    }

    /// Names of every non-boot disk attached to the instance
    pub async fn attached_disks(&self, id: &str) -> Result<Vec<String>> {
        let instance = self.get(id).await?;
        Ok(instance
            .disks
            .iter()
            .filter(|disk| !disk.boot)
            .map(|disk| resource_name(&disk.source).to_string())
            .collect())
    }
}

/// First `max` characters of `s`
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_cloud::fake::{self, FakeCompute};
    use stratus_cloud::{HostMaintenance, RetryPolicy, Status};
    use stratus_registry::NetworkSpec;

    struct Fixture {
        api: Arc<FakeCompute>,
        instances: InstanceManager,
    }

    fn fixture(api: FakeCompute) -> Fixture {
        let api = Arc::new(api);
        api.add_machine_type("n1-standard-1", "z1");
        api.add_network("default");
        let instances = InstanceManager::new(api.clone(), ResourceWaiter::default());
        Fixture { api, instances }
    }

    fn networks(api: &Arc<FakeCompute>, value: serde_json::Value) -> NetworkManager {
        let spec: NetworkSpec = serde_json::from_value(value).unwrap();
        NetworkManager::new(api.clone(), ResourceWaiter::default(), &spec).unwrap()
    }

    fn pool(value: serde_json::Value) -> ResourcePool {
        ResourcePool::parse(&value).unwrap()
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[tokio::test]
    async fn test_create_builds_params() {
        let f = fixture(FakeCompute::new());
        let networks = networks(
            &f.api,
            json!({ "default": {
                "type": "dynamic",
                "dns": ["10.0.0.2"],
                "cloud_properties": { "tags": ["web"], "ephemeral_external_ip": true }
            } }),
        );

        let vm = f
            .instances
            .create(
                "z1",
                &fake::image("stemcell-1"),
                &pool(json!({ "instance_type": "n1-standard-1", "service_scopes": [] })),
                &networks,
                "http://registry:25777",
            )
            .await
            .unwrap();

        assert!(vm.name.starts_with("vm-"));
        assert_eq!(vm.status, Status::Running);
        assert!(vm.public_ip_address().is_some());

        let params = &f.api.inserted_instances()[0];
        assert_eq!(params.description, "Instance managed by BOSH");
        assert_eq!(params.network, "default");
        assert_eq!(params.tags, vec!["web"]);
        assert!(params.boot_disk.auto_delete);
        assert!(params.boot_disk.source_image.ends_with("/stemcell-1"));
        assert!(!params.scheduling.automatic_restart);
        assert_eq!(params.scheduling.on_host_maintenance, HostMaintenance::Migrate);
        assert_eq!(params.service_scopes, None);

        let user_data: serde_json::Value =
            serde_json::from_str(&params.metadata["user_data"]).unwrap();
        assert_eq!(
            user_data,
            json!({
                "instance": { "name": vm.name },
                "registry": { "endpoint": "http://registry:25777" },
                "dns": { "nameserver": ["10.0.0.2"] }
            })
        );
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_machine_type() {
        let f = fixture(FakeCompute::new());
        let networks = networks(&f.api, json!({ "default": { "type": "dynamic" } }));

        let err = f
            .instances
            .create(
                "z1",
                &fake::image("stemcell-1"),
                &pool(json!({ "instance_type": "n1-huge-64" })),
                &networks,
                "http://registry:25777",
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Machine Type `n1-huge-64' not found");
        assert!(f.api.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_wait_failure_is_vm_creation_failed() {
        let f = fixture(FakeCompute::new().stall_instances());
        let networks = networks(&f.api, json!({ "default": { "type": "dynamic" } }));
        let instances = InstanceManager::new(
            f.api.clone(),
            ResourceWaiter::default().with_policy(RetryPolicy::resource_wait().with_max_attempts(3)),
        );

        let err = instances
            .create(
                "z1",
                &fake::image("stemcell-1"),
                &pool(json!({ "instance_type": "n1-standard-1" })),
                &networks,
                "http://registry:25777",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::VmCreationFailed { .. }));
        assert!(err.to_string().starts_with("VM creation failed: Timed out waiting for instance"));
    }

    #[tokio::test]
    async fn test_exists_and_terminate() {
        let f = fixture(FakeCompute::new());
        f.api.add_instance(fake::instance("vm-1", "z1"));

        assert!(f.instances.exists("vm-1").await.unwrap());
        f.instances.terminate("vm-1").await.unwrap();
        assert!(!f.instances.exists("vm-1").await.unwrap());

        let err = f.instances.reboot("vm-1").await.unwrap_err();
        assert!(matches!(err, CloudError::VmNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_metadata_merges_and_truncates() {
        let f = fixture(FakeCompute::new());
        let mut vm = fake::instance("vm-1", "z1");
        vm.metadata = vec![
            stratus_cloud::MetadataItem {
                key: "user_data".to_string(),
                value: "{}".to_string(),
            },
            stratus_cloud::MetadataItem {
                key: "job".to_string(),
                value: "old".to_string(),
            },
        ];
        f.api.add_instance(vm);

        let long_key = "k".repeat(129);
        let long_value = "v".repeat(32769);
        let mut metadata = BTreeMap::new();
        metadata.insert("job".to_string(), "web".to_string());
        metadata.insert(long_key, long_value);

        f.instances.set_metadata("vm-1", &metadata).await.unwrap();

        let stored = f.api.instance("vm-1").unwrap().metadata_map();
        assert_eq!(stored["user_data"], "{}");
        assert_eq!(stored["job"], "web");
        assert_eq!(stored["k".repeat(128).as_str()], "v".repeat(32768));
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_set_metadata_empty_is_noop() {
        let f = fixture(FakeCompute::new());
        f.instances
            .set_metadata("vm-missing", &BTreeMap::new())
            .await
            .unwrap();
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_attach_detach_symmetry() {
        let f = fixture(FakeCompute::new());
        let vm = fake::instance("vm-1", "z1");
        let disk = fake::disk("disk-1", "z1");
        f.api.add_instance(vm.clone());
        f.api.add_disk(disk.clone());

        let before = f.instances.attached_disks("vm-1").await.unwrap();
        assert!(before.is_empty());

        let device = f.instances.attach_disk(&vm, &disk).await.unwrap();
        assert_eq!(device, "persistent-disk-1");
        assert_eq!(f.instances.attached_disks("vm-1").await.unwrap(), vec!["disk-1"]);

        let attached = f.instances.get("vm-1").await.unwrap();
        f.instances.detach_disk(&attached, &disk).await.unwrap();
        assert_eq!(f.instances.attached_disks("vm-1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_detach_unattached_disk_issues_no_calls() {
        let f = fixture(FakeCompute::new());
        let vm = fake::instance("vm-1", "z1");
        f.api.add_instance(vm.clone());

        let err = f
            .instances
            .detach_disk(&vm, &fake::disk("disk-1", "z1"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Disk `disk-1' is not attached to vm `vm-1'");
        assert!(f.api.calls().is_empty());
    }
}
