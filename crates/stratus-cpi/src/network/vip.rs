use super::{delete_external_ip, reload_instance};
use stratus_cloud::{CloudError, ComputeApi, Instance, ResourceWaiter, Result};

/// Binds a reserved static address to the instance
#[derive(Debug, Clone, PartialEq)]
pub struct VipNetwork {
    pub name: String,
    pub ip: Option<String>,
}

impl VipNetwork {
    pub fn new(name: &str, ip: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            ip,
        }
    }

    pub async fn configure(
        &self,
        api: &dyn ComputeApi,
        waiter: &ResourceWaiter,
        instance: &Instance,
    ) -> Result<Instance> {
        let ip = self.ip.as_deref().ok_or_else(|| {
            CloudError::cloud(format!(
                "No static IP address provided for vip network `{}'",
                self.name
            ))
        })?;

        if instance.public_ip_address() == Some(ip) {
            return Ok(instance.clone());
        }

        let address = api
            .get_address_by_ip(ip)
            .await?
            .ok_or_else(|| CloudError::cloud(format!("Static IP address `{}' not allocated", ip)))?;

        if let Some(user) = address.user().filter(|user| *user != instance.name) {
            return Err(CloudError::cloud(format!(
                "Static IP address `{}' already in use by instance `{}'",
                ip, user
            )));
        }

        if let Some(current) = instance.public_ip_address() {
            tracing::debug!(
                "Disassociating IP address `{}' from instance `{}'",
                current,
                instance.name
            );
            delete_external_ip(api, waiter, instance).await?;
        }

        tracing::debug!(
            "Associating static IP address `{}' to instance `{}'",
            ip,
            instance.name
        );
        let operation = api.assign_address(&address, instance).await?;
        waiter.wait_for(api, &operation).await?;

        reload_instance(api, instance).await
    }
}
