//! Resource pool cloud properties

use crate::properties::{as_object, bool_property, string_list_property, string_property};
use serde_json::Value;
use stratus_cloud::{CloudError, HostMaintenance, Result, Scheduling};

/// Validated shape of a VM, parsed once from the raw resource pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePool {
    pub instance_type: String,
    pub zone: Option<String>,
    /// Off by default so the provider does not race external health remediation
    pub automatic_restart: bool,
    pub on_host_maintenance: HostMaintenance,
    /// `None` requests no scopes at all
    pub service_scopes: Option<Vec<String>>,
}

impl ResourcePool {
    pub fn parse(value: &Value) -> Result<Self> {
        let properties = as_object(value, "resource pool cloud properties")?;

        let instance_type = string_property(properties, "instance_type")?.ok_or_else(|| {
            CloudError::cloud("Missing `instance_type' param at resource pool cloud properties")
        })?;

        let on_host_maintenance = match string_property(properties, "on_host_maintenance")? {
            Some(raw) => raw.parse()?,
            None => HostMaintenance::default(),
        };

        let service_scopes = string_list_property(properties, "service_scopes")?;

        Ok(Self {
            instance_type,
            zone: string_property(properties, "zone")?,
            automatic_restart: bool_property(properties, "automatic_restart", false)?,
            on_host_maintenance,
            service_scopes: (!service_scopes.is_empty()).then_some(service_scopes),
        })
    }

    pub fn scheduling(&self) -> Scheduling {
        Scheduling {
            automatic_restart: self.automatic_restart,
            on_host_maintenance: self.on_host_maintenance,
        }
    }
}
