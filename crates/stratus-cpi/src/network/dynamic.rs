use crate::properties::{bool_property, string_list_property, string_property};
use regex::Regex;
use std::sync::LazyLock;
use stratus_cloud::{CloudError, Result};
use stratus_registry::NetworkSettings;

pub const DEFAULT_NETWORK: &str = "default";
pub const MAX_TAG_LENGTH: usize = 63;

/// Validated cloud properties of the dynamic network
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicProperties {
    pub network_name: String,
    pub tags: Vec<String>,
    pub ephemeral_external_ip: bool,
    pub ip_forwarding: bool,
    pub target_pool: Option<String>,
    pub dns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicNetwork {
    pub name: String,
    pub properties: DynamicProperties,
}

impl DynamicNetwork {
    pub fn parse(name: &str, settings: &NetworkSettings) -> Result<Self> {
        let cloud_properties = &settings.cloud_properties;

        let tags = string_list_property(cloud_properties, "tags")?;
        for tag in &tags {
            validate_tag(tag)?;
        }

        let properties = DynamicProperties {
            network_name: string_property(cloud_properties, "network")?
                .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            tags,
            ephemeral_external_ip: bool_property(cloud_properties, "ephemeral_external_ip", false)?,
            ip_forwarding: bool_property(cloud_properties, "ip_forwarding", false)?,
            target_pool: string_property(cloud_properties, "target_pool")?,
            dns: settings.dns.clone().unwrap_or_default(),
        };

        Ok(Self {
            name: name.to_string(),
            properties,
        })
    }
}

/// RFC1035 label: a letter, then letters, digits or hyphens, ending with a letter or digit
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9-]*[A-Za-z0-9]$").expect("tag pattern is valid")
});

pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.len() <= MAX_TAG_LENGTH && TAG_PATTERN.is_match(tag) {
        Ok(())
    } else {
        Err(CloudError::cloud(format!(
            "Invalid tag `{}': does not comply with RFC1035",
            tag
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<DynamicNetwork> {
        let settings: NetworkSettings = serde_json::from_value(value).unwrap();
        DynamicNetwork::parse("default", &settings)
    }

    #[test]
    fn test_tag_validation() {
        assert!(validate_tag("tag1").is_ok());
        assert!(validate_tag("a-b-2").is_ok());

        let too_long = "a".repeat(64);
        for bad in ["tag-", "1tag", too_long.as_str(), "has_underscore", ""] {
            let err = validate_tag(bad).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Invalid tag `{}': does not comply with RFC1035", bad)
            );
        }
        assert!(validate_tag(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_defaults() {
        let network = parse(json!({ "type": "dynamic" })).unwrap();
        assert_eq!(network.properties.network_name, "default");
        assert!(network.properties.tags.is_empty());
        assert!(!network.properties.ephemeral_external_ip);
        assert!(!network.properties.ip_forwarding);
        assert_eq!(network.properties.target_pool, None);
        assert!(network.properties.dns.is_empty());
    }

    #[test]
    fn test_cloud_properties() {
        let network = parse(json!({
            "type": "dynamic",
            "dns": ["8.8.8.8"],
            "cloud_properties": {
                "network": "private",
                "tags": ["web", "bosh-1"],
                "ephemeral_external_ip": true,
                "ip_forwarding": null,
                "target_pool": "web-pool"
            }
        }))
        .unwrap();

        assert_eq!(
            network.properties,
            DynamicProperties {
                network_name: "private".to_string(),
                tags: vec!["web".to_string(), "bosh-1".to_string()],
                ephemeral_external_ip: true,
                ip_forwarding: false,
                target_pool: Some("web-pool".to_string()),
                dns: vec!["8.8.8.8".to_string()],
            }
        );
    }

    #[test]
    fn test_property_type_errors() {
        let err = parse(json!({ "type": "dynamic", "cloud_properties": { "ip_forwarding": "yes" } }))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid `ip_forwarding' property: Boolean expected, `String' provided"
        );

        let err = parse(json!({ "type": "dynamic", "cloud_properties": { "tags": "web" } })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid `tags' property: Array expected, `String' provided"
        );

        let err = parse(json!({ "type": "dynamic", "cloud_properties": { "tags": ["1web"] } }))
            .unwrap_err();
        assert!(err.to_string().contains("does not comply with RFC1035"));
    }
}
