//! Network configuration of VMs
//!
//! A network spec is parsed once into [`Network`] values; the
//! [`NetworkManager`] applies them to a live instance.

mod dynamic;
mod manager;
mod vip;

pub use dynamic::{DEFAULT_NETWORK, DynamicNetwork, DynamicProperties, MAX_TAG_LENGTH, validate_tag};
pub use manager::NetworkManager;
pub use vip::VipNetwork;

use stratus_cloud::{CloudError, ComputeApi, Instance, ResourceWaiter, Result};
use stratus_registry::NetworkSettings;

/// One entry of a network spec
#[derive(Debug, Clone, PartialEq)]
pub enum Network {
    /// Addressing fully managed by the provider
    Dynamic(DynamicNetwork),
    /// A reserved static external address
    Vip(VipNetwork),
}

impl Network {
    pub fn parse(name: &str, settings: &NetworkSettings) -> Result<Self> {
        match settings.network_type.as_deref() {
            Some("dynamic") => Ok(Network::Dynamic(DynamicNetwork::parse(name, settings)?)),
            Some("vip") => Ok(Network::Vip(VipNetwork::new(name, settings.ip.clone()))),
            other => Err(CloudError::cloud(format!(
                "Invalid network type `{}': only `dynamic' and 'vip' are supported",
                other.unwrap_or_default()
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Network::Dynamic(network) => &network.name,
            Network::Vip(network) => &network.name,
        }
    }

    /// Apply this network to `instance` and return its current state
    pub async fn configure(
        &self,
        api: &dyn ComputeApi,
        waiter: &ResourceWaiter,
        instance: &Instance,
    ) -> Result<Instance> {
        match self {
            Network::Dynamic(_) => Ok(instance.clone()),
            Network::Vip(network) => network.configure(api, waiter, instance).await,
        }
    }
}

async fn reload_instance(api: &dyn ComputeApi, instance: &Instance) -> Result<Instance> {
    api.get_instance(&instance.name)
        .await?
        .ok_or_else(|| CloudError::VmNotFound(instance.name.clone()))
}

/// Remove the first access config of the primary interface
async fn delete_external_ip(
    api: &dyn ComputeApi,
    waiter: &ResourceWaiter,
    instance: &Instance,
) -> Result<()> {
    let Some(nic) = instance.primary_interface() else {
        return Ok(());
    };
    let Some(access_config) = nic.access_configs.first() else {
        return Ok(());
    };

    let operation = api
        .delete_access_config(instance, &nic.name, &access_config.name)
        .await?;
    waiter.wait_for(api, &operation).await?;
    Ok(())
}
