use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use stratus_cloud::TaskCheckpoint;
use stratus_cloud::fake::{self, FakeCompute, FakeStorage};
use stratus_cpi::{Cloud, CpiOptions};
use stratus_registry::{AgentSettings, NetworkSpec, RegistryClient, RegistryError};

pub const DEFAULT_ZONE: &str = "us-central1-a";
pub const STEMCELL: &str = "stemcell-1";
pub const REGISTRY_ENDPOINT: &str = "http://registry:25777";

/// Registry kept in memory, keyed by VM id
#[derive(Default)]
pub struct MemoryRegistry {
    settings: Mutex<BTreeMap<String, AgentSettings>>,
    /// HTTP status returned by the next settings update instead of storing it
    failing_update: Mutex<Option<u16>>,
}

impl MemoryRegistry {
    pub fn get(&self, vm_id: &str) -> Option<AgentSettings> {
        self.settings.lock().unwrap().get(vm_id).cloned()
    }

    #[allow(dead_code)]
    pub fn insert(&self, vm_id: &str, settings: AgentSettings) {
        self.settings
            .lock()
            .unwrap()
            .insert(vm_id.to_string(), settings);
    }

    #[allow(dead_code)]
    pub fn fail_next_update(&self, status: u16) {
        *self.failing_update.lock().unwrap() = Some(status);
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.settings.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    fn endpoint(&self) -> &str {
        REGISTRY_ENDPOINT
    }

    async fn read_settings(&self, vm_id: &str) -> stratus_registry::Result<AgentSettings> {
        self.get(vm_id).ok_or_else(|| RegistryError::Status {
            url: format!("{REGISTRY_ENDPOINT}/instances/{vm_id}/settings"),
            status: 404,
        })
    }

    async fn update_settings(&self, vm_id: &str, settings: &AgentSettings) -> stratus_registry::Result<()> {
        if let Some(status) = self.failing_update.lock().unwrap().take() {
            return Err(RegistryError::Status {
                url: format!("{REGISTRY_ENDPOINT}/instances/{vm_id}/settings"),
                status,
            });
        }
        self.settings
            .lock()
            .unwrap()
            .insert(vm_id.to_string(), settings.clone());
        Ok(())
    }

    async fn delete_settings(&self, vm_id: &str) -> stratus_registry::Result<()> {
        self.settings.lock().unwrap().remove(vm_id);
        Ok(())
    }
}

pub fn options() -> CpiOptions {
    CpiOptions::from_value(json!({
        "google": {
            "project": "stratus-test",
            "client_email": "cpi@stratus-test.iam.gserviceaccount.com",
            "pkcs12_key": "a2V5",
            "default_zone": DEFAULT_ZONE,
            "access_key_id": "GOOG1234",
            "secret_access_key": "secret"
        },
        "registry": { "endpoint": REGISTRY_ENDPOINT, "user": "admin", "password": "admin" },
        "agent": { "ntp": ["0.pool.ntp.org"], "agent_id": "ignored" }
    }))
    .unwrap()
}

pub struct TestCloud {
    pub api: Arc<FakeCompute>,
    pub storage: Arc<FakeStorage>,
    pub registry: Arc<MemoryRegistry>,
    pub cloud: Cloud,
}

impl TestCloud {
    /// A cloud with a stemcell, the default network and `n1-standard-1` in a few zones
    pub fn new() -> Self {
        let api = Arc::new(FakeCompute::new());
        api.add_image(fake::image(STEMCELL));
        api.add_network("default");
        for zone in [DEFAULT_ZONE, "us-central1-b", "us-central1-f"] {
            api.add_machine_type("n1-standard-1", zone);
        }

        let storage = Arc::new(FakeStorage::new());
        let registry = Arc::new(MemoryRegistry::default());
        let cloud = Cloud::new(
            options(),
            api.clone(),
            storage.clone(),
            registry.clone(),
            TaskCheckpoint::none(),
        );

        Self {
            api,
            storage,
            registry,
            cloud,
        }
    }

    pub async fn create_vm(&self, resource_pool: Value) -> String {
        self.cloud
            .create_vm(
                "agent-007",
                STEMCELL,
                &resource_pool,
                &dynamic_network(),
                &[],
                None,
            )
            .await
            .unwrap()
    }
}

pub fn dynamic_network() -> NetworkSpec {
    network_spec(json!({ "default": { "type": "dynamic", "dns": ["10.0.0.2"] } }))
}

pub fn network_spec(value: Value) -> NetworkSpec {
    serde_json::from_value(value).unwrap()
}

pub fn small_pool() -> Value {
    json!({ "instance_type": "n1-standard-1" })
}
