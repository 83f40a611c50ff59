//! Agent settings document and instance user data

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Instance metadata key holding the serialized [`UserData`]
pub const USER_DATA_KEY: &str = "user_data";

/// Device path of the boot disk as seen by the agent
pub const SYSTEM_DISK: &str = "/dev/sda";

/// Logical network name -> network settings
pub type NetworkSpec = BTreeMap<String, NetworkSettings>;

/// One entry of a network spec
///
/// Only the fields the CPI interprets are typed; everything else the
/// director sends (netmask, gateway, default, ...) round-trips through `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cloud_properties: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VmSettings {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiskSettings {
    #[serde(default)]
    pub system: String,

    /// Disk id -> device name
    #[serde(default)]
    pub persistent: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings document stored in the registry for one VM
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub vm: VmSettings,

    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub networks: NetworkSpec,

    #[serde(default)]
    pub disks: DiskSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Value>,

    /// Operator supplied agent properties (ntp, blobstore, mbus, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentSettings {
    /// Settings written when a VM is created
    pub fn initial(
        vm_id: impl Into<String>,
        agent_id: impl Into<String>,
        networks: NetworkSpec,
        env: Option<Value>,
    ) -> Self {
        Self {
            vm: VmSettings { id: vm_id.into() },
            agent_id: agent_id.into(),
            networks,
            disks: DiskSettings {
                system: SYSTEM_DISK.to_string(),
                persistent: BTreeMap::new(),
                extra: Map::new(),
            },
            env,
            extra: Map::new(),
        }
    }

    /// Fill in operator defaults. Keys already set on the document win;
    /// `env` is only taken from the defaults when none was given.
    pub fn with_defaults(mut self, defaults: &Map<String, Value>) -> Self {
        for (key, value) in defaults {
            match key.as_str() {
                "vm" | "agent_id" | "networks" | "disks" => {}
                "env" => {
                    if self.env.is_none() {
                        self.env = Some(value.clone());
                    }
                }
                _ => {
                    self.extra
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
        self
    }

    pub fn add_persistent_disk(&mut self, disk_id: impl Into<String>, device_name: impl Into<String>) {
        self.disks
            .persistent
            .insert(disk_id.into(), device_name.into());
    }

    pub fn remove_persistent_disk(&mut self, disk_id: &str) -> Option<String> {
        self.disks.persistent.remove(disk_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsInfo {
    #[serde(default)]
    pub nameserver: Vec<String>,
}

/// Bootstrap document the CPI stores in instance metadata under [`USER_DATA_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsInfo>,
}

impl UserData {
    /// The `dns` section is omitted when there are no nameservers
    pub fn new(instance_name: impl Into<String>, registry_endpoint: impl Into<String>, nameservers: Vec<String>) -> Self {
        Self {
            instance: Some(InstanceInfo {
                name: instance_name.into(),
            }),
            registry: Some(RegistryInfo {
                endpoint: registry_endpoint.into(),
            }),
            dns: (!nameservers.is_empty()).then_some(DnsInfo {
                nameserver: nameservers,
            }),
        }
    }

    pub fn instance_name(&self) -> Option<&str> {
        self.instance.as_ref().map(|i| i.name.as_str())
    }

    pub fn registry_endpoint(&self) -> Option<&str> {
        self.registry.as_ref().map(|r| r.endpoint.as_str())
    }

    pub fn nameservers(&self) -> &[String] {
        self.dns
            .as_ref()
            .map(|d| d.nameserver.as_slice())
            .unwrap_or_default()
    }
}
