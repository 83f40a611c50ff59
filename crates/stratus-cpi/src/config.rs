//! CPI configuration
//!
//! ```json
//! {
//!   "google":   { "project": "...", "client_email": "...", "pkcs12_key": "<base64>",
//!                 "default_zone": "us-central1-a", "access_key_id": "...", "secret_access_key": "..." },
//!   "registry": { "endpoint": "http://registry:25777", "user": "admin", "password": "admin" },
//!   "agent":    { "ntp": ["0.pool.ntp.org"] }
//! }
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::Path;
use stratus_cloud::{CloudError, Result};
use stratus_registry::RegistryConfig;

const REQUIRED_KEYS: &[(&str, &[&str])] = &[
    (
        "google",
        &[
            "project",
            "client_email",
            "pkcs12_key",
            "default_zone",
            "access_key_id",
            "secret_access_key",
        ],
    ),
    ("registry", &["endpoint", "user", "password"]),
];

#[derive(Clone, Deserialize)]
pub struct GoogleOptions {
    pub project: String,
    pub client_email: String,
    /// Decoded PKCS#12 service account key
    #[serde(deserialize_with = "decode_base64")]
    pub pkcs12_key: Vec<u8>,
    pub default_zone: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for GoogleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOptions")
            .field("project", &self.project)
            .field("client_email", &self.client_email)
            .field("pkcs12_key", &"<redacted>")
            .field("default_zone", &self.default_zone)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

fn decode_base64<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    let compact: String = encoded.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|e| serde::de::Error::custom(format!("invalid base64 in `pkcs12_key': {e}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpiOptions {
    pub google: GoogleOptions,
    pub registry: RegistryConfig,
    /// Operator defaults merged into every agent settings document
    #[serde(default)]
    pub agent: Map<String, Value>,
}

impl CpiOptions {
    pub fn from_value(value: Value) -> Result<Self> {
        let missing = missing_keys(&value);
        if !missing.is_empty() {
            return Err(CloudError::cloud(format!(
                "Missing configuration parameters: {}",
                missing.join(", ")
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| CloudError::cloud(format!("Invalid configuration: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }
}

/// Every required `section:key` absent from the document, in declaration order
fn missing_keys(value: &Value) -> Vec<String> {
    let mut missing = Vec::new();
    for (section, keys) in REQUIRED_KEYS {
        let table = value.get(section).and_then(Value::as_object);
        for key in keys.iter() {
            if !table.is_some_and(|t| t.contains_key(*key)) {
                missing.push(format!("{section}:{key}"));
            }
        }
    }
    missing
}
