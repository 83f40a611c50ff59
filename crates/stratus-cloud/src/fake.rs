//! In-memory compute and storage providers for tests
//!
//! Mutations are applied to the in-memory state immediately, while the
//! status of created resources and operations only settles after a
//! configurable number of polls. Every call is recorded so tests can assert
//! which provider calls were (or were not) issued.

use crate::api::{Acl, Bucket, ComputeApi, StorageApi, StoredObject};
use crate::error::{CloudError, Result};
use crate::params::{DiskParams, DiskSource, ImageParams, InstanceParams, SnapshotParams};
use crate::resource::{
    AccessConfig, Address, AttachedDisk, Disk, Image, Instance, MachineType, MetadataItem,
    Network, NetworkInterface, Operation, Snapshot, Status, TargetPool,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const PROJECT_LINK: &str = "https://www.googleapis.com/compute/v1/projects/stratus-test";
pub const EXTERNAL_NAT: &str = "External NAT";

pub fn zone_link(zone: &str) -> String {
    format!("{PROJECT_LINK}/zones/{zone}")
}

pub fn instance_link(zone: &str, name: &str) -> String {
    format!("{PROJECT_LINK}/zones/{zone}/instances/{name}")
}

pub fn disk_link(zone: &str, name: &str) -> String {
    format!("{PROJECT_LINK}/zones/{zone}/disks/{name}")
}

pub fn network_link(name: &str) -> String {
    format!("{PROJECT_LINK}/global/networks/{name}")
}

/// A running instance on the `default` network with only a boot disk
pub fn instance(name: &str, zone: &str) -> Instance {
    Instance {
        name: name.to_string(),
        self_link: instance_link(zone, name),
        zone: zone_link(zone),
        status: Status::Running,
        machine_type: "n1-standard-1".to_string(),
        disks: vec![AttachedDisk {
            source: disk_link(zone, name),
            device_name: "persistent-disk-0".to_string(),
            boot: true,
        }],
        metadata: Vec::new(),
        tags: Vec::new(),
        network_interfaces: vec![NetworkInterface {
            name: "nic0".to_string(),
            network: network_link("default"),
            network_ip: Some("10.240.0.2".to_string()),
            access_configs: Vec::new(),
        }],
        can_ip_forward: false,
    }
}

/// A ready 10 GiB disk
pub fn disk(name: &str, zone: &str) -> Disk {
    Disk {
        name: name.to_string(),
        self_link: disk_link(zone, name),
        zone: zone_link(zone),
        status: Status::Ready,
        size_gb: 10,
        source_image: None,
    }
}

pub fn image(name: &str) -> Image {
    Image {
        name: name.to_string(),
        self_link: format!("{PROJECT_LINK}/global/images/{name}"),
        status: Status::Ready,
        description: String::new(),
    }
}

pub fn snapshot(name: &str, disk: &Disk) -> Snapshot {
    Snapshot {
        name: name.to_string(),
        self_link: format!("{PROJECT_LINK}/global/snapshots/{name}"),
        status: Status::Ready,
        source_disk: disk.self_link.clone(),
        description: String::new(),
    }
}

/// A reserved, unused static address
pub fn address(name: &str, ip: &str) -> Address {
    Address {
        name: name.to_string(),
        address: ip.to_string(),
        region: "us-central1".to_string(),
        users: Vec::new(),
    }
}

pub fn target_pool(name: &str) -> TargetPool {
    TargetPool {
        name: name.to_string(),
        self_link: format!("{PROJECT_LINK}/regions/us-central1/targetPools/{name}"),
        region: "us-central1".to_string(),
        instances: Vec::new(),
    }
}

#[derive(Default)]
struct State {
    instances: BTreeMap<String, Instance>,
    disks: BTreeMap<String, Disk>,
    snapshots: BTreeMap<String, Snapshot>,
    images: BTreeMap<String, Image>,
    operations: BTreeMap<String, Operation>,
    machine_types: Vec<MachineType>,
    networks: BTreeMap<String, Network>,
    addresses: Vec<Address>,
    target_pools: BTreeMap<String, TargetPool>,
    /// Remaining polls before a resource settles, keyed by `kind:name`
    pending: HashMap<String, u32>,
    /// One-shot failures keyed by method name
    failures: HashMap<String, String>,
    calls: Vec<String>,
    inserted_instances: Vec<InstanceParams>,
    inserted_disks: Vec<DiskParams>,
    inserted_images: Vec<ImageParams>,
    next_id: u64,
}

impl State {
    fn enter(&mut self, method: &str, target: &str) -> Result<()> {
        self.calls.push(format!("{method} {target}"));
        match self.failures.remove(method) {
            Some(message) => Err(CloudError::Api(message)),
            None => Ok(()),
        }
    }

    /// Counts one poll; true once the resource has settled
    fn advance(&mut self, key: &str) -> bool {
        match self.pending.get_mut(key) {
            Some(0) => {
                self.pending.remove(key);
                true
            }
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn ephemeral_ip(&mut self) -> String {
        format!("203.0.113.{}", self.next_id() % 250 + 1)
    }

    fn operation(&mut self, target_link: &str, zone: Option<&str>, settle_after: u32) -> Operation {
        let name = format!("operation-{}", self.next_id());
        let operation = Operation {
            name: name.clone(),
            zone: zone.map(str::to_string),
            status: Status::Pending,
            target_link: Some(target_link.to_string()),
            error: None,
        };
        self.pending.insert(format!("operation:{name}"), settle_after);
        self.operations.insert(name, operation.clone());
        operation
    }

    fn instance_mut(&mut self, name: &str) -> Result<&mut Instance> {
        self.instances
            .get_mut(name)
            .ok_or_else(|| CloudError::Api(format!("instance `{name}' does not exist")))
    }
}

/// In-memory [`ComputeApi`]
pub struct FakeCompute {
    state: Mutex<State>,
    settle_after: u32,
    stall_instances: bool,
}

impl Default for FakeCompute {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCompute {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            settle_after: 0,
            stall_instances: false,
        }
    }

    /// Created resources and operations report ready only after `polls` extra reloads
    pub fn settle_after(mut self, polls: u32) -> Self {
        self.settle_after = polls;
        self
    }

    /// Created instances never leave `PROVISIONING`
    pub fn stall_instances(mut self) -> Self {
        self.stall_instances = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next call to `method` fail with an API error
    pub fn fail_next(&self, method: &str, message: &str) {
        self.lock()
            .failures
            .insert(method.to_string(), message.to_string());
    }

    pub fn add_instance(&self, instance: Instance) {
        self.lock().instances.insert(instance.name.clone(), instance);
    }

    pub fn add_disk(&self, disk: Disk) {
        self.lock().disks.insert(disk.name.clone(), disk);
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.lock().snapshots.insert(snapshot.name.clone(), snapshot);
    }

    pub fn add_image(&self, image: Image) {
        self.lock().images.insert(image.name.clone(), image);
    }

    pub fn add_machine_type(&self, name: &str, zone: &str) {
        self.lock().machine_types.push(MachineType {
            name: name.to_string(),
            zone: zone.to_string(),
            description: format!("{name} in {zone}"),
        });
    }

    pub fn add_network(&self, name: &str) {
        self.lock().networks.insert(
            name.to_string(),
            Network {
                name: name.to_string(),
                self_link: network_link(name),
            },
        );
    }

    pub fn add_address(&self, address: Address) {
        self.lock().addresses.push(address);
    }

    pub fn add_target_pool(&self, pool: TargetPool) {
        self.lock().target_pools.insert(pool.name.clone(), pool);
    }

    /// Current state of an instance, without recording a call
    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.lock().instances.get(name).cloned()
    }

    pub fn disk(&self, name: &str) -> Option<Disk> {
        self.lock().disks.get(name).cloned()
    }

    pub fn has_snapshot(&self, name: &str) -> bool {
        self.lock().snapshots.contains_key(name)
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.lock().images.contains_key(name)
    }

    pub fn address(&self, ip: &str) -> Option<Address> {
        self.lock()
            .addresses
            .iter()
            .find(|a| a.address == ip)
            .cloned()
    }

    pub fn target_pool(&self, name: &str) -> Option<TargetPool> {
        self.lock().target_pools.get(name).cloned()
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.lock().instances.keys().cloned().collect()
    }

    pub fn inserted_instances(&self) -> Vec<InstanceParams> {
        self.lock().inserted_instances.clone()
    }

    pub fn inserted_disks(&self) -> Vec<DiskParams> {
        self.lock().inserted_disks.clone()
    }

    pub fn inserted_images(&self) -> Vec<ImageParams> {
        self.lock().inserted_images.clone()
    }

    /// Every call as `"<method> <target>"`, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls that change provider state
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("get_"))
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(method))
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn get_instance(&self, name: &str) -> Result<Option<Instance>> {
        let mut state = self.lock();
        state.enter("get_instance", name)?;
        let settled = state.advance(&format!("instance:{name}"));
        Ok(state.instances.get_mut(name).map(|instance| {
            if settled {
                instance.status = Status::Running;
            }
            instance.clone()
        }))
    }

    async fn insert_instance(&self, params: &InstanceParams) -> Result<Instance> {
        let mut state = self.lock();
        state.enter("insert_instance", &params.name)?;

        let access_configs = if params.external_ip {
            vec![AccessConfig {
                name: EXTERNAL_NAT.to_string(),
                nat_ip: Some(state.ephemeral_ip()),
            }]
        } else {
            Vec::new()
        };
        let internal_ip = format!("10.240.0.{}", state.next_id() % 250 + 2);

        let instance = Instance {
            name: params.name.clone(),
            self_link: instance_link(&params.zone, &params.name),
            zone: zone_link(&params.zone),
            status: Status::Provisioning,
            machine_type: params.machine_type.clone(),
            disks: vec![AttachedDisk {
                source: disk_link(&params.zone, &params.name),
                device_name: "persistent-disk-0".to_string(),
                boot: true,
            }],
            metadata: params
                .metadata
                .iter()
                .map(|(key, value)| MetadataItem {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            tags: params.tags.clone(),
            network_interfaces: vec![NetworkInterface {
                name: "nic0".to_string(),
                network: network_link(&params.network),
                network_ip: Some(internal_ip),
                access_configs,
            }],
            can_ip_forward: params.can_ip_forward,
        };

        if !self.stall_instances {
            state
                .pending
                .insert(format!("instance:{}", params.name), self.settle_after);
        }
        state.inserted_instances.push(params.clone());
        state
            .instances
            .insert(instance.name.clone(), instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, instance: &Instance) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("delete_instance", &instance.name)?;
        state.instances.remove(&instance.name);
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn reset_instance(&self, instance: &Instance) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("reset_instance", &instance.name)?;
        state.instance_mut(&instance.name)?;
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn set_instance_metadata(
        &self,
        instance: &Instance,
        metadata: &BTreeMap<String, String>,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("set_instance_metadata", &instance.name)?;
        state.instance_mut(&instance.name)?.metadata = metadata
            .iter()
            .map(|(key, value)| MetadataItem {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn set_instance_tags(&self, instance: &Instance, tags: &[String]) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("set_instance_tags", &instance.name)?;
        state.instance_mut(&instance.name)?.tags = tags.to_vec();
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn attach_disk(
        &self,
        instance: &Instance,
        source: &str,
        _writable: bool,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("attach_disk", &instance.name)?;
        let live = state.instance_mut(&instance.name)?;
        let device_name = format!("persistent-disk-{}", live.disks.len());
        live.disks.push(AttachedDisk {
            source: source.to_string(),
            device_name,
            boot: false,
        });
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn detach_disk(&self, instance: &Instance, device_name: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("detach_disk", &instance.name)?;
        state
            .instance_mut(&instance.name)?
            .disks
            .retain(|d| d.device_name != device_name);
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn add_access_config(&self, instance: &Instance, interface: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("add_access_config", &instance.name)?;
        let ip = state.ephemeral_ip();
        let live = state.instance_mut(&instance.name)?;
        if let Some(nic) = live
            .network_interfaces
            .iter_mut()
            .find(|nic| nic.name == interface)
        {
            nic.access_configs.push(AccessConfig {
                name: EXTERNAL_NAT.to_string(),
                nat_ip: Some(ip),
            });
        }
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn delete_access_config(
        &self,
        instance: &Instance,
        interface: &str,
        access_config: &str,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("delete_access_config", &instance.name)?;
        let live = state.instance_mut(&instance.name)?;
        if let Some(nic) = live
            .network_interfaces
            .iter_mut()
            .find(|nic| nic.name == interface)
        {
            nic.access_configs.retain(|ac| ac.name != access_config);
        }
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn get_disk(&self, name: &str) -> Result<Option<Disk>> {
        let mut state = self.lock();
        state.enter("get_disk", name)?;
        let settled = state.advance(&format!("disk:{name}"));
        Ok(state.disks.get_mut(name).map(|disk| {
            if settled {
                disk.status = Status::Ready;
            }
            disk.clone()
        }))
    }

    async fn insert_disk(&self, params: &DiskParams) -> Result<Disk> {
        let mut state = self.lock();
        state.enter("insert_disk", &params.name)?;
        let (size_gb, source_image) = match &params.source {
            DiskSource::Blank { size_gb } => (*size_gb, None),
            DiskSource::Image { source_image } => (10, Some(source_image.clone())),
        };
        let disk = Disk {
            name: params.name.clone(),
            self_link: disk_link(&params.zone, &params.name),
            zone: zone_link(&params.zone),
            status: Status::Creating,
            size_gb,
            source_image,
        };
        state
            .pending
            .insert(format!("disk:{}", params.name), self.settle_after);
        state.inserted_disks.push(params.clone());
        state.disks.insert(disk.name.clone(), disk.clone());
        Ok(disk)
    }

    async fn delete_disk(&self, disk: &Disk) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("delete_disk", &disk.name)?;
        state.disks.remove(&disk.name);
        Ok(state.operation(&disk.self_link, Some(disk.zone_name()), self.settle_after))
    }

    async fn create_snapshot(&self, disk: &Disk, params: &SnapshotParams) -> Result<Snapshot> {
        let mut state = self.lock();
        state.enter("create_snapshot", &disk.name)?;
        let snapshot = Snapshot {
            name: params.name.clone(),
            self_link: format!("{PROJECT_LINK}/global/snapshots/{}", params.name),
            status: Status::Creating,
            source_disk: disk.self_link.clone(),
            description: params.description.clone(),
        };
        state
            .pending
            .insert(format!("snapshot:{}", params.name), self.settle_after);
        state
            .snapshots
            .insert(snapshot.name.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, name: &str) -> Result<Option<Snapshot>> {
        let mut state = self.lock();
        state.enter("get_snapshot", name)?;
        let settled = state.advance(&format!("snapshot:{name}"));
        Ok(state.snapshots.get_mut(name).map(|snapshot| {
            if settled {
                snapshot.status = Status::Ready;
            }
            snapshot.clone()
        }))
    }

    async fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("delete_snapshot", &snapshot.name)?;
        state.snapshots.remove(&snapshot.name);
        Ok(state.operation(&snapshot.self_link, None, self.settle_after))
    }

    async fn get_image(&self, name: &str) -> Result<Option<Image>> {
        let mut state = self.lock();
        state.enter("get_image", name)?;
        let settled = state.advance(&format!("image:{name}"));
        Ok(state.images.get_mut(name).map(|image| {
            if settled {
                image.status = Status::Ready;
            }
            image.clone()
        }))
    }

    async fn insert_image(&self, params: &ImageParams) -> Result<Image> {
        let mut state = self.lock();
        state.enter("insert_image", &params.name)?;
        let image = Image {
            name: params.name.clone(),
            self_link: format!("{PROJECT_LINK}/global/images/{}", params.name),
            status: Status::Pending,
            description: params.description.clone(),
        };
        state
            .pending
            .insert(format!("image:{}", params.name), self.settle_after);
        state.inserted_images.push(params.clone());
        state.images.insert(image.name.clone(), image.clone());
        Ok(image)
    }

    async fn delete_image(&self, image: &Image) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("delete_image", &image.name)?;
        state.images.remove(&image.name);
        Ok(state.operation(&image.self_link, None, self.settle_after))
    }

    async fn get_machine_type(&self, name: &str, zone: &str) -> Result<Option<MachineType>> {
        let mut state = self.lock();
        state.enter("get_machine_type", name)?;
        Ok(state
            .machine_types
            .iter()
            .find(|mt| mt.name == name && mt.zone == zone)
            .cloned())
    }

    async fn get_network(&self, name: &str) -> Result<Option<Network>> {
        let mut state = self.lock();
        state.enter("get_network", name)?;
        Ok(state.networks.get(name).cloned())
    }

    async fn get_address_by_ip(&self, ip: &str) -> Result<Option<Address>> {
        let mut state = self.lock();
        state.enter("get_address_by_ip", ip)?;
        Ok(state.addresses.iter().find(|a| a.address == ip).cloned())
    }

    async fn assign_address(&self, address: &Address, instance: &Instance) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("assign_address", &instance.name)?;
        let live = state.instance_mut(&instance.name)?;
        if let Some(nic) = live.network_interfaces.first_mut() {
            nic.access_configs = vec![AccessConfig {
                name: EXTERNAL_NAT.to_string(),
                nat_ip: Some(address.address.clone()),
            }];
        }
        if let Some(stored) = state
            .addresses
            .iter_mut()
            .find(|a| a.address == address.address)
        {
            stored.users = vec![instance.self_link.clone()];
        }
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn release_address(&self, address: &Address, instance: &Instance) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("release_address", &instance.name)?;
        let live = state.instance_mut(&instance.name)?;
        for nic in live.network_interfaces.iter_mut() {
            nic.access_configs
                .retain(|ac| ac.nat_ip.as_deref() != Some(address.address.as_str()));
        }
        if let Some(stored) = state
            .addresses
            .iter_mut()
            .find(|a| a.address == address.address)
        {
            stored.users.clear();
        }
        Ok(state.operation(&instance.self_link, Some(instance.zone_name()), self.settle_after))
    }

    async fn get_target_pool(&self, name: &str) -> Result<Option<TargetPool>> {
        let mut state = self.lock();
        state.enter("get_target_pool", name)?;
        Ok(state.target_pools.get(name).cloned())
    }

    async fn add_target_pool_instance(
        &self,
        pool: &TargetPool,
        instance: &Instance,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.enter("add_target_pool_instance", &instance.name)?;
        let stored = state
            .target_pools
            .get_mut(&pool.name)
            .ok_or_else(|| CloudError::Api(format!("target pool `{}' does not exist", pool.name)))?;
        stored.instances.push(instance.self_link.clone());
        Ok(state.operation(&pool.self_link, None, self.settle_after))
    }

    async fn get_operation(&self, name: &str, _zone: Option<&str>) -> Result<Option<Operation>> {
        let mut state = self.lock();
        state.enter("get_operation", name)?;
        let settled = state.advance(&format!("operation:{name}"));
        Ok(state.operations.get_mut(name).map(|operation| {
            if settled {
                operation.status = Status::Done;
            }
            operation.clone()
        }))
    }
}

#[derive(Default)]
struct StorageState {
    buckets: BTreeMap<String, Acl>,
    objects: BTreeMap<(String, String), Acl>,
    failures: HashMap<String, String>,
    /// Upload failure raised after the object has been stored
    interrupted_upload: Option<String>,
    calls: Vec<String>,
}

/// In-memory [`StorageApi`]
#[derive(Default)]
pub struct FakeStorage {
    state: Mutex<StorageState>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StorageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(state: &mut StorageState, method: &str, target: &str) -> Result<()> {
        state.calls.push(format!("{method} {target}"));
        match state.failures.remove(method) {
            Some(message) => Err(CloudError::Api(message)),
            None => Ok(()),
        }
    }

    pub fn fail_next(&self, method: &str, message: &str) {
        self.lock()
            .failures
            .insert(method.to_string(), message.to_string());
    }

    /// Make the next upload store its object and then fail
    pub fn interrupt_next_upload(&self, message: &str) {
        self.lock().interrupted_upload = Some(message.to_string());
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().buckets.len()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

#[async_trait]
impl StorageApi for FakeStorage {
    async fn create_bucket(&self, name: &str, acl: Acl) -> Result<Bucket> {
        let mut state = self.lock();
        Self::enter(&mut state, "create_bucket", name)?;
        state.buckets.insert(name.to_string(), acl);
        Ok(Bucket {
            name: name.to_string(),
        })
    }

    async fn upload_object(
        &self,
        bucket: &Bucket,
        key: &str,
        source: &Path,
        acl: Acl,
    ) -> Result<StoredObject> {
        let mut state = self.lock();
        Self::enter(&mut state, "upload_object", key)?;
        std::fs::metadata(source)?;
        state
            .objects
            .insert((bucket.name.clone(), key.to_string()), acl);
        if let Some(message) = state.interrupted_upload.take() {
            return Err(CloudError::Api(message));
        }
        Ok(StoredObject {
            bucket: bucket.name.clone(),
            key: key.to_string(),
            public_url: format!("https://storage.googleapis.com/{}/{}", bucket.name, key),
        })
    }

    async fn delete_object(&self, bucket: &Bucket, key: &str) -> Result<()> {
        let mut state = self.lock();
        Self::enter(&mut state, "delete_object", key)?;
        state
            .objects
            .remove(&(bucket.name.clone(), key.to_string()));
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &Bucket) -> Result<()> {
        let mut state = self.lock();
        Self::enter(&mut state, "delete_bucket", &bucket.name)?;
        state.buckets.remove(&bucket.name);
        Ok(())
    }
}
