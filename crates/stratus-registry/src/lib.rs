//! Stratus settings registry
//!
//! The registry is a key-value store holding one [`AgentSettings`] document
//! per VM. The CPI writes it through [`HttpRegistryClient`]; the agent on the
//! VM reads it back through [`SettingsFetcher`], which first discovers the
//! registry endpoint from the instance metadata.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod settings;

// Re-exports
pub use client::{HttpRegistryClient, RegistryClient, RegistryConfig};
pub use error::{LoadSettingsError, RegistryError, Result};
pub use fetcher::{METADATA_USER_DATA_URL, NetworkKind, SettingsFetcher, classify_network};
pub use settings::{
    AgentSettings, DiskSettings, DnsInfo, InstanceInfo, NetworkSettings, NetworkSpec,
    RegistryInfo, USER_DATA_KEY, UserData, VmSettings,
};
