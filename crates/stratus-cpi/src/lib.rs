//! Stratus CPI core
//!
//! Lifecycle management of VMs, persistent disks, snapshots and stemcell
//! images on top of the provider traits in `stratus-cloud`.
//!
//! ```text
//!                    ┌─────────┐
//!                    │  Cloud  │
//!                    └────┬────┘
//!      ┌──────────┬───────┼────────┬──────────────┬──────────────┐
//!      ▼          ▼       ▼        ▼              ▼              ▼
//!  Instance    Disk   Snapshot   Image      NetworkManager  RegistryManager
//!  Manager    Manager  Manager  Manager    (dynamic / vip)  (retry, 3 tries)
//!      └──────────┴───────┴────────┴──────────────┘              │
//!                         │                                      ▼
//!              ComputeApi / StorageApi                    RegistryClient
//!                 + ResourceWaiter
//! ```

pub mod cloud;
pub mod config;
pub mod disk_manager;
pub mod image_manager;
pub mod instance_manager;
pub mod network;
pub mod properties;
pub mod registry_manager;
pub mod resource_pool;
pub mod snapshot_manager;

pub use cloud::{Cloud, StemcellProperties};
pub use config::{CpiOptions, GoogleOptions};
pub use disk_manager::DiskManager;
pub use image_manager::ImageManager;
pub use instance_manager::InstanceManager;
pub use network::{DynamicNetwork, Network, NetworkManager, VipNetwork};
pub use registry_manager::RegistryManager;
pub use resource_pool::ResourcePool;
pub use snapshot_manager::DiskSnapshotManager;
