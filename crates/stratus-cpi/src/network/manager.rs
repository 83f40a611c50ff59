use super::{DynamicProperties, Network, delete_external_ip, reload_instance};
use std::sync::Arc;
use stratus_cloud::{CloudError, ComputeApi, Instance, ResourceWaiter, Result, TargetPool};
use stratus_registry::NetworkSpec;

/// Applies a parsed network spec to instances
pub struct NetworkManager {
    api: Arc<dyn ComputeApi>,
    waiter: ResourceWaiter,
    networks: Vec<Network>,
    properties: DynamicProperties,
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("networks", &self.networks)
            .finish()
    }
}

impl NetworkManager {
    /// Parse `spec`: exactly one dynamic network, at most one vip network
    pub fn new(api: Arc<dyn ComputeApi>, waiter: ResourceWaiter, spec: &NetworkSpec) -> Result<Self> {
        let mut networks = Vec::with_capacity(spec.len());
        let mut properties = None;
        let mut has_vip = false;

        for (name, settings) in spec {
            let network = Network::parse(name, settings)?;
            match &network {
                Network::Dynamic(dynamic) => {
                    if properties.is_some() {
                        return Err(CloudError::cloud(
                            "Must have exactly one `dynamic' network per instance",
                        ));
                    }
                    properties = Some(dynamic.properties.clone());
                }
                Network::Vip(_) => {
                    if has_vip {
                        return Err(CloudError::cloud(
                            "Must have exactly one `vip' network per instance",
                        ));
                    }
                    has_vip = true;
                }
            }
            networks.push(network);
        }

        let properties = properties.ok_or_else(|| {
            CloudError::cloud("At least one `dynamic' network should be defined")
        })?;

        Ok(Self {
            api,
            waiter,
            networks,
            properties,
        })
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn dns(&self) -> &[String] {
        &self.properties.dns
    }

    /// Network name of the dynamic network, checked against the provider
    pub async fn network_name(&self) -> Result<String> {
        let name = &self.properties.network_name;
        match self.api.get_network(name).await? {
            Some(network) => Ok(network.name),
            None => Err(CloudError::cloud(format!("Network `{}' not found", name))),
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.properties.tags
    }

    pub fn ephemeral_external_ip(&self) -> bool {
        self.properties.ephemeral_external_ip
    }

    pub fn ip_forwarding(&self) -> bool {
        self.properties.ip_forwarding
    }

    pub async fn target_pool(&self) -> Result<Option<TargetPool>> {
        let Some(name) = self.properties.target_pool.as_deref() else {
            return Ok(None);
        };

        match self.api.get_target_pool(name).await? {
            Some(pool) => Ok(Some(pool)),
            None => Err(CloudError::cloud(format!("Target Pool `{}' not found", name))),
        }
    }

    /// Apply every network, release a leftover static address when no vip
    /// network is declared, then join the target pool.
    pub async fn configure(&self, instance: &Instance) -> Result<Instance> {
        let api = self.api.as_ref();
        let mut instance = instance.clone();

        for network in &self.networks {
            instance = network.configure(api, &self.waiter, &instance).await?;
        }

        if !self.networks.iter().any(|n| matches!(n, Network::Vip(_))) {
            instance = self.release_static_ip(instance).await?;
        }

        if let Some(pool) = self.target_pool().await? {
            if !pool.contains(&instance) {
                tracing::debug!(
                    "Adding instance `{}' to target pool `{}'",
                    instance.name,
                    pool.name
                );
                let operation = api.add_target_pool_instance(&pool, &instance).await?;
                self.waiter.wait_for(api, &operation).await?;
            }
        }

        Ok(instance)
    }

    /// Reconcile a running instance with the spec. Changes that need the VM
    /// recreated are rejected before anything is modified.
    pub async fn update(&self, instance: &Instance) -> Result<()> {
        let current_network = instance.network_name().unwrap_or_default();
        let desired_network = self.network_name().await?;
        if current_network != desired_network {
            return Err(CloudError::NotSupported(format!(
                "Network change requires VM recreation: `{}' to `{}'",
                current_network, desired_network
            )));
        }

        if instance.can_ip_forward != self.properties.ip_forwarding {
            return Err(CloudError::NotSupported(format!(
                "IP forwarding change requires VM recreation: `{}' to `{}'",
                instance.can_ip_forward, self.properties.ip_forwarding
            )));
        }

        let instance = self.configure(instance).await?;
        let instance = self.reconcile_ephemeral_ip(instance).await?;
        self.reconcile_tags(&instance).await
    }

    async fn release_static_ip(&self, instance: Instance) -> Result<Instance> {
        let Some(ip) = instance.public_ip_address() else {
            return Ok(instance);
        };
        let Some(address) = self.api.get_address_by_ip(ip).await? else {
            return Ok(instance);
        };

        tracing::debug!(
            "Releasing static IP address `{}' from instance `{}'",
            address.address,
            instance.name
        );
        let api = self.api.as_ref();
        let operation = api.release_address(&address, &instance).await?;
        self.waiter.wait_for(api, &operation).await?;
        reload_instance(api, &instance).await
    }

    async fn reconcile_ephemeral_ip(&self, instance: Instance) -> Result<Instance> {
        let api = self.api.as_ref();
        let public_ip = instance.public_ip_address().map(str::to_string);

        match (self.properties.ephemeral_external_ip, public_ip) {
            (true, None) => {
                let Some(nic) = instance.primary_interface() else {
                    return Ok(instance);
                };
                tracing::debug!("Adding ephemeral IP address to instance `{}'", instance.name);
                let operation = api.add_access_config(&instance, &nic.name).await?;
                self.waiter.wait_for(api, &operation).await?;
                reload_instance(api, &instance).await
            }
            (false, Some(ip)) => {
                if api.get_address_by_ip(&ip).await?.is_some() {
                    return Ok(instance);
                }
                tracing::debug!(
                    "Removing ephemeral IP address `{}' from instance `{}'",
                    ip,
                    instance.name
                );
                delete_external_ip(api, &self.waiter, &instance).await?;
                reload_instance(api, &instance).await
            }
            _ => Ok(instance),
        }
    }

    async fn reconcile_tags(&self, instance: &Instance) -> Result<()> {
        let mut current = instance.tags.clone();
        current.sort();
        let mut desired = self.properties.tags.clone();
        desired.sort();
        if current == desired {
            return Ok(());
        }

        tracing::debug!(
            "Updating tags of instance `{}' to {:?}",
            instance.name,
            self.properties.tags
        );
        let api = self.api.as_ref();
        let operation = api
            .set_instance_tags(instance, &self.properties.tags)
            .await?;
        self.waiter.wait_for(api, &operation).await?;
        Ok(())
    }
}
